use rexarm_core::{CalibrationContext, DepthModel, DisplayRect, PointerReadout, resolve};
use rexarm_traits::DepthImage;
use rstest::rstest;

fn depth_with(row: usize, col: usize, raw: u16) -> DepthImage {
    let mut d = DepthImage::zeros(640, 480);
    d.data.fill(600);
    d.set(row, col, raw);
    d
}

fn expected_z_base(raw: u16) -> f64 {
    95.0 - 12.36 * (f64::from(raw) / 2842.5 + 1.1863).tan()
}

#[test]
fn raw_400_decodes_to_known_height() {
    let m = DepthModel::default();
    let z = 12.36 * (400.0f64 / 2842.5 + 1.1863).tan();
    assert!((m.distance(400) - z).abs() < 1e-12);
    assert!((m.height_above_base(400) - (95.0 - z)).abs() < 1e-12);
    // tan(1.3270) ≈ 4.02 → Z ≈ 49.7, Z_base ≈ 45.3
    assert!((z - 49.7).abs() < 0.1, "z = {z}");
}

#[test]
fn identity_affine_gives_recentered_pixels() {
    let rect = DisplayRect::default();
    let cal = CalibrationContext::identity(320.0, 240.0);
    // window (600, 300) → image (360, 260)
    let depth = depth_with(260, 360, 400);
    let out = resolve((600, 300), &rect, &depth, Some(&cal), &DepthModel::default());
    let PointerReadout::World { x, y, raw, world } = out else {
        panic!("expected world readout, got {out:?}");
    };
    assert_eq!((x, y, raw), (360, 260, 400));
    assert!((world[0] - 40.0).abs() < 1e-12);
    assert!((world[1] - (-20.0)).abs() < 1e-12);
    assert!((world[2] - expected_z_base(400)).abs() < 1e-12);
}

#[test]
fn only_the_top_left_block_is_applied() {
    let mut cal = CalibrationContext::new(0.0, 0.0, [[2.0, 0.0], [0.0, 0.5]]);
    cal.affine[(0, 2)] = 1000.0;
    cal.affine[(2, 2)] = -7.0;
    let (wx, wy) = cal.pixel_to_world(10.0, -8.0);
    assert!((wx - 20.0).abs() < 1e-12);
    assert!((wy - 4.0).abs() < 1e-12);
}

#[test]
fn uncalibrated_reports_pixels_only() {
    let rect = DisplayRect::default();
    let depth = depth_with(10, 20, 777);
    let out = resolve((260, 50), &rect, &depth, None, &DepthModel::default());
    assert_eq!(
        out,
        PointerReadout::Pixel {
            x: 20,
            y: 10,
            raw: 777
        }
    );
    assert_eq!(out.pixel_text(), "(20,10,777)");
    assert_eq!(out.world_text(), "(-,-,-)");
}

#[rstest]
#[case((239, 100))]
#[case((880, 100))]
#[case((500, 39))]
#[case((500, 520))]
#[case((-5, -5))]
fn outside_display_is_no_position(#[case] cursor: (i32, i32)) {
    let rect = DisplayRect::default();
    let depth = depth_with(0, 0, 400);
    let cal = CalibrationContext::identity(0.0, 0.0);
    for c in [None, Some(&cal)] {
        assert_eq!(
            resolve(cursor, &rect, &depth, c, &DepthModel::default()),
            PointerReadout::NoPosition
        );
    }
}

#[test]
fn unpopulated_depth_is_no_position() {
    let rect = DisplayRect::default();
    let depth = DepthImage::zeros(640, 480);
    let cal = CalibrationContext::identity(0.0, 0.0);
    let out = resolve((400, 200), &rect, &depth, Some(&cal), &DepthModel::default());
    assert_eq!(out, PointerReadout::NoPosition);
    assert_eq!(out.pixel_text(), "(-,-,-)");
}

#[test]
fn cursor_beyond_a_smaller_frame_is_no_position() {
    let rect = DisplayRect::default();
    let mut depth = DepthImage::zeros(100, 100);
    depth.data.fill(500);
    let out = resolve((600, 300), &rect, &depth, None, &DepthModel::default());
    assert_eq!(out, PointerReadout::NoPosition);
}
