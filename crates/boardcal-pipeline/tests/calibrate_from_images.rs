//! Full pipeline test: render synthetic board views through a ground-truth
//! camera, write them to disk, then run collection, detection and
//! calibration end to end.

use boardcal_core::{
    make_pinhole_camera, BoardSpec, BrownConrady5, DistortionParams, FxFyCxCySkew,
    IntrinsicsParams, Iso3, PinholeCamera, Real,
};
use boardcal_detect::DetectParams;
use boardcal_pipeline::{
    build_dataset_from_images, calibrate_intrinsics, collect_board_images, undistort_image,
    CalibrationConfig,
};
use image::GrayImage;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

const IMG_W: u32 = 640;
const IMG_H: u32 = 480;

fn ground_truth_camera() -> PinholeCamera {
    make_pinhole_camera(
        FxFyCxCySkew {
            fx: 600.0,
            fy: 590.0,
            cx: 320.0,
            cy: 240.0,
            skew: 0.0,
        },
        BrownConrady5 {
            k1: -0.05,
            k2: 0.0,
            k3: 0.0,
            p1: 0.0,
            p2: 0.0,
            iters: 12,
        },
    )
}

fn board() -> BoardSpec {
    BoardSpec::new(9, 6, 0.04).unwrap()
}

/// Poses that keep the whole board visible with margin in every view.
fn board_poses() -> Vec<Iso3> {
    let board = board();
    let center = Vector3::new(
        (board.cols - 1) as Real * board.square_size / 2.0,
        (board.rows - 1) as Real * board.square_size / 2.0,
        0.0,
    );

    (0..5)
        .map(|i| {
            let yaw = 0.09 * (i as Real - 2.0);
            let pitch = 0.06 * (i as Real - 2.0).abs() - 0.06;
            let rotation = UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 1.0, 0.0) * yaw)
                * UnitQuaternion::from_scaled_axis(Vector3::new(1.0, 0.0, 0.0) * pitch);
            let z = 0.62 + 0.04 * i as Real;
            // Rotate around the board center, then push it in front of the
            // camera so the center lands on the optical axis.
            let t = Vector3::new(0.0, 0.0, z) - rotation * center;
            Iso3::from_parts(t.into(), rotation)
        })
        .collect()
}

/// Render a view of the board by backprojecting every pixel onto the board
/// plane through the ground-truth camera.
fn render_view(camera: &PinholeCamera, pose: &Iso3) -> GrayImage {
    let board = board();
    let sq = board.square_size;
    // The squares extend one square beyond the outermost inner corners.
    let x_max = board.cols as Real * sq;
    let y_max = board.rows as Real * sq;

    let rot = pose.rotation.to_rotation_matrix();
    let r = rot.matrix();
    let t = pose.translation.vector;

    GrayImage::from_fn(IMG_W, IMG_H, |px, py| {
        let ray = camera.backproject_pixel(&nalgebra::Vector2::new(px as Real, py as Real));

        // Solve r1*X + r2*Y - s*dir = -t for board coordinates (X, Y).
        let mut a = Matrix3::<Real>::zeros();
        a.set_column(0, &r.column(0).into_owned());
        a.set_column(1, &r.column(1).into_owned());
        a.set_column(2, &(-ray.dir));
        let Some(a_inv) = a.try_inverse() else {
            return image::Luma([255]);
        };
        let sol = a_inv * (-t);
        let (bx, by, s) = (sol.x, sol.y, sol.z);
        if s <= 0.0 || bx < -sq || by < -sq || bx >= x_max || by >= y_max {
            return image::Luma([255]);
        }

        let si = ((bx + sq) / sq).floor() as i64;
        let sj = ((by + sq) / sq).floor() as i64;
        image::Luma([if (si + sj) % 2 == 0 { 0 } else { 255 }])
    })
}

#[test]
fn calibrates_from_rendered_images() {
    let cam_gt = ground_truth_camera();
    let poses = board_poses();

    let dir = tempfile::tempdir().unwrap();
    for (i, pose) in poses.iter().enumerate() {
        let img = render_view(&cam_gt, pose);
        img.save(dir.path().join(format!("view_{i}.png"))).unwrap();
    }

    let paths = collect_board_images(dir.path()).unwrap();
    assert_eq!(paths.len(), poses.len());

    let image_dataset =
        build_dataset_from_images(&paths, &board(), &DetectParams::default()).unwrap();
    assert_eq!(image_dataset.image_size, [IMG_W, IMG_H]);
    assert!(
        image_dataset.dataset.num_views() >= 4,
        "expected at least 4 usable views, got {}",
        image_dataset.dataset.num_views()
    );

    let mut report =
        calibrate_intrinsics(&image_dataset.dataset, &CalibrationConfig::default()).unwrap();
    report.image_size = Some(image_dataset.image_size);

    assert!(report.converged, "refinement did not converge");
    assert!(
        report.mean_reproj_error < 0.8,
        "mean reprojection error too high: {}",
        report.mean_reproj_error
    );

    let IntrinsicsParams::FxFyCxCySkew { params: k } = report.camera.intrinsics;
    assert!(
        (k.fx - cam_gt.k.fx).abs() / cam_gt.k.fx < 0.03,
        "fx {} vs ground truth {}",
        k.fx,
        cam_gt.k.fx
    );
    assert!(
        (k.fy - cam_gt.k.fy).abs() / cam_gt.k.fy < 0.03,
        "fy {} vs ground truth {}",
        k.fy,
        cam_gt.k.fy
    );
    assert!((k.cx - cam_gt.k.cx).abs() < 15.0, "cx {}", k.cx);
    assert!((k.cy - cam_gt.k.cy).abs() < 15.0, "cy {}", k.cy);

    let DistortionParams::BrownConrady5 { params: dist } = report.camera.distortion else {
        panic!("expected Brown-Conrady distortion in the report");
    };
    assert!(
        (dist.k1 - cam_gt.dist.k1).abs() < 0.05,
        "k1 {} vs ground truth {}",
        dist.k1,
        cam_gt.dist.k1
    );

    // Undistort the first input image with the calibrated model, as the
    // classic calibration flow does.
    let first = image::open(&paths[0]).unwrap().to_rgb8();
    let camera = make_pinhole_camera(k, dist);
    let corrected = undistort_image(&first, &camera, 1.0);
    assert_eq!(corrected.dimensions(), (IMG_W, IMG_H));
    let out_path = dir.path().join("calibrated_result.png");
    corrected.save(&out_path).unwrap();
    assert!(out_path.exists());
}
