use kurbo::Point;

use super::*;

fn default_style() -> WatermarkStyle {
    WatermarkStyle::default()
}

#[test]
fn grid_is_four_columns_by_eight_rows() {
    let layout = tile_layout(800, 600, &default_style());
    assert_eq!(layout.anchors.len(), 32);
    assert_eq!(layout.anchors[0], Point::new(-800.0, -600.0));
    assert_eq!(layout.anchors[1], Point::new(-800.0, -450.0));
    assert_eq!(layout.anchors[8], Point::new(-400.0, -600.0));
    assert_eq!(layout.anchors[31], Point::new(400.0, 450.0));
}

#[test]
fn odd_dimensions_keep_the_same_grid() {
    let layout = tile_layout(101, 37, &default_style());
    assert_eq!(layout.anchors.len(), 32);
    assert!(layout.anchors.iter().all(|p| p.x < 101.0 && p.y < 37.0));
}

#[test]
fn font_size_scales_with_width() {
    assert_eq!(tile_layout(1500, 10, &default_style()).font_size_px, 100);
    assert_eq!(tile_layout(800, 10, &default_style()).font_size_px, 53);
    assert_eq!(tile_layout(4, 4, &default_style()).font_size_px, 1);
}

#[test]
fn zero_sized_canvas_has_no_tiles() {
    assert!(tile_layout(0, 10, &default_style()).anchors.is_empty());
    assert!(tile_layout(10, 0, &default_style()).anchors.is_empty());
}

#[test]
fn origin_maps_to_canvas_center() {
    let layout = tile_layout(200, 100, &default_style());
    let center = layout.transform * Point::new(0.0, 0.0);
    assert!((center.x - 100.0).abs() < 1e-9);
    assert!((center.y - 50.0).abs() < 1e-9);
}

#[test]
fn rotation_is_counter_clockwise_on_screen() {
    // -45 degrees in a y-down space sends +x towards the upper right.
    let layout = tile_layout(200, 200, &default_style());
    let p = layout.transform * Point::new(10.0, 0.0);
    assert!(p.x > 100.0);
    assert!(p.y < 100.0);
    let expected = 10.0 / 2f64.sqrt();
    assert!((p.x - 100.0 - expected).abs() < 1e-9);
    assert!((100.0 - p.y - expected).abs() < 1e-9);
}

#[test]
fn some_tiles_land_inside_the_canvas() {
    let layout = tile_layout(640, 480, &default_style());
    let inside = layout
        .canvas_anchors()
        .filter(|p| p.x >= 0.0 && p.x < 640.0 && p.y >= 0.0 && p.y < 480.0)
        .count();
    assert!(inside >= 6, "only {inside} tiles visible");
}
