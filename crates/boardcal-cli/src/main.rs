use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use boardcal_core::{
    make_pinhole_camera, BoardSpec, DistortionParams, IntrinsicsParams, Real,
};
use boardcal_detect::DetectParams;
use boardcal_pipeline::{
    build_dataset_from_images, calibrate_intrinsics, collect_board_images, undistort_image,
    CalibrationConfig, IntrinsicsReport,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Single-camera intrinsic calibration from chessboard images.
#[derive(Debug, Parser)]
#[command(author, version, about = "Chessboard intrinsic calibration pipeline")]
struct Args {
    /// Directory containing chessboard images (jpg/jpeg/png).
    #[arg(long)]
    images: PathBuf,

    /// Inner corners along the board X direction.
    #[arg(long, default_value_t = 9)]
    cols: u32,

    /// Inner corners along the board Y direction.
    #[arg(long, default_value_t = 6)]
    rows: u32,

    /// Square side length; the calibration is expressed in this unit.
    #[arg(long, default_value_t = 1.0)]
    square_size: Real,

    /// Optional path for the JSON calibration report.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Output path for the undistorted first image.
    #[arg(long, default_value = "calibrated_result.png")]
    undistorted: PathBuf,

    /// Free-scaling parameter for undistortion (0 = valid pixels only,
    /// 1 = keep all source pixels).
    #[arg(long, default_value_t = 1.0)]
    alpha: Real,
}

fn run(args: &Args) -> Result<IntrinsicsReport> {
    let board = BoardSpec::new(args.cols, args.rows, args.square_size)?;
    let detect_params = DetectParams::default();

    let paths = collect_board_images(&args.images)?;
    info!(count = paths.len(), "found board images");

    let image_dataset = build_dataset_from_images(&paths, &board, &detect_params)?;
    let mut report = calibrate_intrinsics(&image_dataset.dataset, &CalibrationConfig::default())?;
    report.image_size = Some(image_dataset.image_size);

    // Undistort the first usable image with the calibrated model.
    let sample = &image_dataset.used_paths[0];
    undistort_sample(sample, &report, args.alpha, &args.undistorted)?;

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(report_path, json)
            .with_context(|| format!("failed to write report to {}", report_path.display()))?;
    }

    Ok(report)
}

fn undistort_sample(
    sample: &Path,
    report: &IntrinsicsReport,
    alpha: Real,
    out: &Path,
) -> Result<()> {
    let IntrinsicsParams::FxFyCxCySkew { params: k } = report.camera.intrinsics;
    let DistortionParams::BrownConrady5 { params: dist } = report.camera.distortion else {
        anyhow::bail!("calibration report carries no distortion model");
    };
    let camera = make_pinhole_camera(k, dist);

    let src = image::open(sample)
        .with_context(|| format!("failed to reopen {}", sample.display()))?
        .to_rgb8();
    let corrected = undistort_image(&src, &camera, alpha);
    corrected
        .save(out)
        .with_context(|| format!("failed to write undistorted image to {}", out.display()))?;
    info!(path = %out.display(), "wrote undistorted sample");
    Ok(())
}

fn print_summary(report: &IntrinsicsReport) {
    let IntrinsicsParams::FxFyCxCySkew { params: k } = report.camera.intrinsics;
    println!("Camera matrix:");
    println!("  [{:10.3} {:10.3} {:10.3}]", k.fx, k.skew, k.cx);
    println!("  [{:10.3} {:10.3} {:10.3}]", 0.0, k.fy, k.cy);
    println!("  [{:10.3} {:10.3} {:10.3}]", 0.0, 0.0, 1.0);

    if let DistortionParams::BrownConrady5 { params: d } = &report.camera.distortion {
        println!(
            "Distortion coefficients [k1 k2 p1 p2 k3]:\n  [{:.6} {:.6} {:.6} {:.6} {:.6}]",
            d.k1, d.k2, d.p1, d.p2, d.k3
        );
    }

    println!(
        "Views used: {}  mean reprojection error: {:.4} px",
        report.views_used, report.mean_reproj_error
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(report) => print_summary(&report),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn run_fails_cleanly_without_boards() {
        let dir = tempfile::tempdir().unwrap();
        let blank = GrayImage::from_pixel(320, 240, image::Luma([255]));
        blank.save(dir.path().join("blank.png")).unwrap();

        let args = Args {
            images: dir.path().to_path_buf(),
            cols: 9,
            rows: 6,
            square_size: 1.0,
            report: None,
            undistorted: dir.path().join("out.png"),
            alpha: 1.0,
        };

        let err = run(&args).unwrap_err();
        assert!(
            err.to_string().contains("no chessboard corners"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn bad_pattern_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            images: dir.path().to_path_buf(),
            cols: 1,
            rows: 6,
            square_size: 1.0,
            report: None,
            undistorted: dir.path().join("out.png"),
            alpha: 1.0,
        };

        assert!(run(&args).is_err());
    }
}
