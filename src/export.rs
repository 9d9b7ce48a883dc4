use std::{error::Error, fmt, fs, io, path::Path};

use image::{GrayImage, ImageError, RgbImage};
use ndarray::ArrayView4;

/// Writes batches of generated samples to disk.
pub trait ImageExporter {
    /// Tiles `images` (`[n, height, width, channel]`, values in [0, 1]) into a `grid_size`
    /// (rows, cols) grid and writes it to `path`.
    fn save_grid(
        &mut self,
        images: ArrayView4<f32>,
        grid_size: (usize, usize),
        path: &Path,
    ) -> Result<(), ExportErr>;
}

/// An `ImageExporter` writing PNG grids, grayscale for one channel and RGB for three.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridExporter;

impl GridExporter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageExporter for GridExporter {
    fn save_grid(
        &mut self,
        images: ArrayView4<f32>,
        grid_size: (usize, usize),
        path: &Path,
    ) -> Result<(), ExportErr> {
        let canvas = tile(images, grid_size)?;
        let (_, h, w, c) = images.dim();
        let (rows, cols) = grid_size;
        let (width, height) = dims_u32(cols * w, rows * h)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ExportErr::Io)?;
        }

        match c {
            1 => GrayImage::from_raw(width, height, canvas)
                .ok_or(ExportErr::Canvas)?
                .save(path)?,
            3 => RgbImage::from_raw(width, height, canvas)
                .ok_or(ExportErr::Canvas)?
                .save(path)?,
            _ => return Err(ExportErr::UnsupportedChannels(c)),
        }

        Ok(())
    }
}

/// Lays the first `rows * cols` images out row-major in one interleaved `u8` canvas.
///
/// Missing images leave their cells black.
pub fn tile(images: ArrayView4<f32>, (rows, cols): (usize, usize)) -> Result<Vec<u8>, ExportErr> {
    let (_, h, w, c) = images.dim();
    if c != 1 && c != 3 {
        return Err(ExportErr::UnsupportedChannels(c));
    }

    let row_len = cols * w * c;
    let mut canvas = vec![0; rows * h * row_len];

    for (i, image) in images.outer_iter().take(rows * cols).enumerate() {
        let (top, left) = ((i / cols) * h, (i % cols) * w);

        for ((y, x, ch), &value) in image.indexed_iter() {
            let pixel = (value.clamp(0., 1.) * 255.).round() as u8;
            canvas[(top + y) * row_len + (left + x) * c + ch] = pixel;
        }
    }

    Ok(canvas)
}

fn dims_u32(width: usize, height: usize) -> Result<(u32, u32), ExportErr> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(ExportErr::Canvas),
    }
}

#[derive(Debug)]
pub enum ExportErr {
    UnsupportedChannels(usize),
    Canvas,
    Io(io::Error),
    Image(ImageError),
}

impl fmt::Display for ExportErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportErr::UnsupportedChannels(c) => {
                write!(f, "can't export images with {c} channels, expected 1 or 3")
            }
            ExportErr::Canvas => write!(f, "the sample grid doesn't fit in an image"),
            ExportErr::Io(e) => write!(f, "io error: {e}"),
            ExportErr::Image(e) => write!(f, "image encoding error: {e}"),
        }
    }
}

impl Error for ExportErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExportErr::Io(e) => Some(e),
            ExportErr::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ImageError> for ExportErr {
    fn from(value: ImageError) -> Self {
        Self::Image(value)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;

    use super::*;

    #[test]
    fn images_are_tiled_row_major() {
        let images = Array4::from_shape_fn((4, 1, 2, 1), |(i, _, _, _)| i as f32 / 3.);

        let canvas = tile(images.view(), (2, 2)).unwrap();

        assert_eq!(canvas, vec![0, 0, 85, 85, 170, 170, 255, 255]);
    }

    #[test]
    fn missing_images_leave_black_cells() {
        let images = Array4::ones((1, 1, 1, 1));

        let canvas = tile(images.view(), (2, 2)).unwrap();

        assert_eq!(canvas, vec![255, 0, 0, 0]);
    }

    #[test]
    fn values_are_clamped() {
        let images = Array4::from_shape_vec((2, 1, 1, 1), vec![-3., 7.]).unwrap();

        assert_eq!(tile(images.view(), (1, 2)).unwrap(), vec![0, 255]);
    }

    #[test]
    fn rgb_channels_are_interleaved() {
        let images = Array4::from_shape_vec((1, 1, 1, 3), vec![1., 0., 1.]).unwrap();

        assert_eq!(tile(images.view(), (1, 1)).unwrap(), vec![255, 0, 255]);
    }

    #[test]
    fn other_channel_counts_are_rejected() {
        let images = Array4::zeros((1, 2, 2, 2));

        let err = GridExporter
            .save_grid(images.view(), (1, 1), Path::new("unused.png"))
            .unwrap_err();
        assert!(matches!(err, ExportErr::UnsupportedChannels(2)));
    }

    #[test]
    fn writes_a_png_creating_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen_img").join("train_00000000.png");
        let images = Array4::from_elem((4, 3, 5, 1), 0.5);

        GridExporter.save_grid(images.view(), (2, 2), &path).unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (10, 6));
    }
}
