use common::{blog, payload, text};
use quickdata::prelude::*;
use quickdata_core::geo::DISTANCE_COLUMN;
use serde_json::json;

mod common;

/// Places at increasing distance from (0, 0), plus one without coordinates.
fn places() -> QuickData<MemoryStore> {
    let mut data = blog();
    {
        let mut repo = data.repository("posts").unwrap();
        for (title, lat, lng) in [
            ("Far", Some(0.0), Some(5.0)),
            ("Origin", Some(0.0), Some(0.0)),
            ("Near", Some(0.0), Some(0.5)),
            ("Nowhere", None, None),
            ("Middle", Some(1.0), Some(1.0)),
        ] {
            repo.create(&payload(json!({
                "title": title,
                "latitude": lat,
                "longitude": lng,
            })))
            .unwrap();
        }
    }
    data
}

fn distance(record: &Record) -> f64 {
    record
        .get(DISTANCE_COLUMN)
        .and_then(Value::as_f64)
        .unwrap_or_else(|| panic!("no distance on {record:?}"))
}

fn titles(result: &SearchResult) -> Vec<String> {
    result.records().iter().map(|r| text(r, "title")).collect()
}

#[test]
fn distance_to_the_origin_itself_is_zero() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    let geo = GeoDistanceFilter::new(DistanceUnit::Kilometers)
        .origin(GeoPoint::new(0.0, 0.0))
        .radius(Radius::Within(1.0));
    let result = repo.search_scoped(&[], None, Some(&geo)).unwrap();
    assert_eq!(titles(&result), ["Origin"]);
    assert_eq!(distance(&result.records()[0]), 0.0);
}

#[test]
fn rows_beyond_the_radius_are_excluded() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    // 0.5 degrees of longitude on the equator is about 55.6 km
    let geo = GeoDistanceFilter::new(DistanceUnit::Kilometers)
        .origin(GeoPoint::new(0.0, 0.0))
        .radius(Radius::Within(100.0));
    let result = repo.search_scoped(&[], None, Some(&geo)).unwrap();
    let mut found = titles(&result);
    found.sort();
    assert_eq!(found, ["Near", "Origin"]);
    for record in result.records() {
        assert!(distance(record) < 100.0);
    }
}

#[test]
fn sort_by_distance_is_non_decreasing() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    let geo = GeoDistanceFilter::new(DistanceUnit::Kilometers)
        .origin(GeoPoint::new(0.0, 0.0))
        .sort_by_distance(true);
    let result = repo.search_scoped(&[], None, Some(&geo)).unwrap();

    assert_eq!(titles(&result), ["Origin", "Near", "Middle", "Far"]);
    let distances: Vec<f64> = result.records().iter().map(distance).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn unlimited_radius_still_requires_coordinates() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    let geo = GeoDistanceFilter::new(DistanceUnit::Miles).origin(GeoPoint::new(0.0, 0.0));
    let result = repo.search_scoped(&[], None, Some(&geo)).unwrap();
    assert_eq!(result.records().len(), 4);
    assert!(!titles(&result).contains(&"Nowhere".to_string()));
}

#[test]
fn miles_use_the_smaller_earth_radius() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    let km = GeoDistanceFilter::new(DistanceUnit::Kilometers).origin(GeoPoint::new(0.0, 0.0));
    let mi = GeoDistanceFilter::new(DistanceUnit::Miles).origin(GeoPoint::new(0.0, 0.0));
    let filter = SearchFilter::new().where_eq("title", "Far").unwrap();

    let in_km = repo.search_scoped(&[], Some(filter.clone()), Some(&km)).unwrap();
    let in_mi = repo.search_scoped(&[], Some(filter), Some(&mi)).unwrap();
    let ratio = distance(&in_km.records()[0]) / distance(&in_mi.records()[0]);
    assert!((ratio - 6371.0 / 3959.0).abs() < 1e-9);
}

#[test]
fn from_params_needs_both_coordinates() {
    let settings = Settings::default();
    assert!(!GeoDistanceFilter::from_params(Some(1.0), None, None, None, &settings).is_active());
    assert!(
        GeoDistanceFilter::from_params(Some(1.0), Some(2.0), None, None, &settings).is_active()
    );
}

#[test]
fn from_params_falls_back_to_default_distance() {
    let mut data = places()
        .with_settings(Settings {
            default_distance: Some(100.0),
            ..Settings::default()
        })
        .unwrap();
    let settings = data.settings().clone();
    let geo = GeoDistanceFilter::from_params(Some(0.0), Some(0.0), None, Some("distance"), &settings);
    let mut repo = data.repository("posts").unwrap();
    let result = repo.search_scoped(&[], None, Some(&geo)).unwrap();
    assert_eq!(titles(&result), ["Origin", "Near"]);
}

#[test]
fn inactive_filter_changes_nothing() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    let geo = GeoDistanceFilter::new(DistanceUnit::Kilometers);
    let result = repo.search_scoped(&[], None, Some(&geo)).unwrap();
    assert_eq!(result.records().len(), 5);
    assert!(result.records()[0].get(DISTANCE_COLUMN).is_none());
}

#[test]
fn distance_is_not_written_back_on_save() {
    let mut data = places();
    let mut repo = data.repository("posts").unwrap();
    let geo = GeoDistanceFilter::new(DistanceUnit::Kilometers)
        .origin(GeoPoint::new(0.0, 0.0))
        .radius(Radius::Within(1.0));
    let mut origin = repo
        .search_scoped(&[], None, Some(&geo))
        .unwrap()
        .into_records()
        .remove(0);
    origin.set("title", "Renamed");
    repo.save(&mut origin).unwrap();

    let stored = repo.find_or_fail(origin.id().unwrap(), &[]).unwrap();
    assert_eq!(text(&stored, "title"), "Renamed");
    assert!(stored.get(DISTANCE_COLUMN).is_none());
}
