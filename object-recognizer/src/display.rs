use opencv::{
    core::{Point, Scalar},
    highgui, imgproc,
    prelude::*,
};
use vision::{FrameReport, GrayImage};

use crate::convert::gray_image_to_mat;

pub const RAW_WINDOW: &str = "0. Original video";
pub const MASK_WINDOW: &str = "1. Thresholded";
pub const CLEANED_WINDOW: &str = "2. Cleaned thresholded";
pub const LABELS_WINDOW: &str = "3. Connected components";
pub const FEATURES_WINDOW: &str = "4. Connected components features";

const WINDOWS: [&str; 5] = [RAW_WINDOW, MASK_WINDOW, CLEANED_WINDOW, LABELS_WINDOW, FEATURES_WINDOW];

pub fn open_windows() -> anyhow::Result<()> {
    for name in WINDOWS {
        highgui::named_window(name, highgui::WINDOW_NORMAL)?;
    }
    Ok(())
}

pub fn close_windows() -> anyhow::Result<()> {
    highgui::destroy_all_windows()?;
    Ok(())
}

/// Shows the raw frame and everything derived from it.
pub fn show_report(frame: &Mat, report: &FrameReport) -> anyhow::Result<()> {
    highgui::imshow(RAW_WINDOW, frame)?;
    if report.skipped {
        return Ok(());
    }

    highgui::imshow(MASK_WINDOW, &gray_image_to_mat(&report.mask)?)?;
    highgui::imshow(CLEANED_WINDOW, &gray_image_to_mat(&report.cleaned)?)?;
    highgui::imshow(LABELS_WINDOW, &color_mapped(&report.labels.to_display())?)?;

    let mut features = color_mapped(&report.annotated)?;
    let white = Scalar::new(255.0, 255.0, 255.0, 0.0);
    for region in &report.regions {
        let at = Point::new(region.centroid.x.round() as i32, region.centroid.y.round() as i32);
        imgproc::put_text(
            &mut features,
            &region.label.to_string(),
            at,
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.0,
            white,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }
    let text = report.classification_text();
    if !text.is_empty() {
        imgproc::put_text(
            &mut features,
            &text,
            Point::new(10, 30),
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.0,
            white,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }
    highgui::imshow(FEATURES_WINDOW, &features)?;

    Ok(())
}

fn color_mapped(img: &GrayImage) -> anyhow::Result<Mat> {
    let mut jet = Mat::default();
    imgproc::apply_color_map(&gray_image_to_mat(img)?, &mut jet, imgproc::COLORMAP_JET)?;
    Ok(jet)
}
