//! End-to-end chessboard intrinsic calibration.
//!
//! The pipeline mirrors the classic single-camera calibration flow: collect
//! board images, detect and refine pattern corners, accumulate 3D-2D
//! correspondences, solve for intrinsics and distortion (closed-form seed
//! plus Levenberg-Marquardt refinement), and undistort images with the
//! result.

mod dataset;
mod ingest;
mod intrinsics;
mod undistort;

pub use dataset::{DatasetError, PlanarDataset};
pub use ingest::{build_dataset_from_images, collect_board_images, ImageDataset};
pub use intrinsics::{
    calibrate_intrinsics, intrinsics_seed_from_views, CalibrationConfig, IntrinsicsReport,
    RobustConfig,
};
pub use undistort::{optimal_new_intrinsics, remap_bilinear, undistort_image, UndistortMaps};

pub use boardcal_core::CorrespondenceView;
