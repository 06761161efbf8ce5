use anyhow::bail;
use nalgebra::{DMatrix, Vector3};
use opencv::{
    core::{Scalar, Vec3b, CV_8UC1, CV_8UC3},
    prelude::*,
};
use vision::{ColorImage, GrayImage};

pub fn mat_to_color_image(mat: &Mat) -> anyhow::Result<ColorImage> {
    if mat.typ() != CV_8UC3 {
        bail!("Expected an 8 bit BGR frame, got Mat type {}", mat.typ());
    }
    let rows = mat.rows() as usize;
    let cols = mat.cols() as usize;
    let mut res = DMatrix::from_element(rows, cols, Vector3::new(0, 0, 0));

    for r in 0..rows {
        for c in 0..cols {
            let pixel = mat.at_2d::<Vec3b>(r as i32, c as i32)?;
            res[(r, c)] = Vector3::new(pixel[0], pixel[1], pixel[2]);
        }
    }

    Ok(res)
}

pub fn gray_image_to_mat(img: &GrayImage) -> anyhow::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(img.nrows() as i32, img.ncols() as i32, CV_8UC1, Scalar::all(0.0))?;
    for r in 0..img.nrows() {
        for c in 0..img.ncols() {
            *mat.at_2d_mut::<u8>(r as i32, c as i32)? = img[(r, c)];
        }
    }

    Ok(mat)
}

pub fn color_image_to_mat(img: &ColorImage) -> anyhow::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(img.nrows() as i32, img.ncols() as i32, CV_8UC3, Scalar::all(0.0))?;
    for r in 0..img.nrows() {
        for c in 0..img.ncols() {
            let p = img[(r, c)];
            *mat.at_2d_mut::<Vec3b>(r as i32, c as i32)? = Vec3b::from([p.x, p.y, p.z]);
        }
    }

    Ok(mat)
}
