use burn::prelude::{Backend, Int, Tensor};
use rerun::{AsComponents, RecordingStream, external::ndarray};

use crate::losses::LossLog;

/// Streams loss terms and image samples of a training run to rerun.
pub struct GanLogger {
    stream: RecordingStream,
    pub log_image_interval: usize,
    pub image_grid_options: ImageGridOptions,
}

/// Maps `[N, C, H, W]` images in [-1, 1] to `[N, H, W, C]` pixel values.
fn convert_to_picture<B: Backend>(image_tensor: Tensor<B, 4>) -> Tensor<B, 4, Int> {
    let image_tensor = (image_tensor * 127.5 + 127.5).clamp(0.0, 255.0);
    let image_tensor = image_tensor.int();
    image_tensor.permute([0, 2, 3, 1])
}

impl GanLogger {
    pub fn new(stream: RecordingStream) -> Self {
        Self {
            stream,
            log_image_interval: 5,
            image_grid_options: ImageGridOptions::Auto,
        }
    }

    fn log_error(&self, path: &str, message: String) {
        let _ = self.stream.log(
            path,
            &rerun::TextLog::new(message).with_level(rerun::TextLogLevel::ERROR),
        );
    }

    /// Logs every term of `log` as its own scalar series.
    pub fn log_losses(&self, log: &LossLog, base_path: &str, iteration: usize) {
        self.stream
            .set_time_sequence(format!("{}_iteration", base_path), iteration as i64);
        for (name, value) in log.iter() {
            let _ = self.stream.log(
                format!("graphs/{}/loss/{}", base_path, name),
                &rerun::Scalar::new(*value),
            );
        }
    }

    /// Logs real and generated images as grids every `log_image_interval` iterations.
    pub fn log_samples<B: Backend>(
        &self,
        real: Tensor<B, 4>,
        fake: Tensor<B, 4>,
        base_path: &str,
        iteration: usize,
    ) {
        if iteration % self.log_image_interval != 0 {
            return;
        }
        for (name, images) in [("real_images", real), ("fake_images", fake)] {
            let path = format!("{}/images/{}", base_path, name);
            match LogContainer::from_burn_4d_tensoru8(
                convert_to_picture(images),
                self.image_grid_options.clone(),
            ) {
                Ok(c) => {
                    let _ = self.stream.log(path, &c);
                }
                Err(e) => self.log_error(&path, format!("Failed to convert {} due to {:?}", name, e)),
            }
        }
    }

    pub fn log_failure(&self, base_path: &str, message: String) {
        self.log_error(&format!("{}/errors", base_path), message);
    }
}

pub struct LogContainer<K: ?Sized + AsComponents> {
    component: K,
}

impl<K: ?Sized + AsComponents> AsComponents for LogContainer<K> {
    fn as_serialized_batches(&self) -> Vec<rerun::SerializedComponentBatch> {
        self.component.as_serialized_batches()
    }
    fn to_arrow(
        &self,
    ) -> rerun::SerializationResult<
        Vec<(
            rerun::external::arrow::datatypes::Field,
            rerun::external::arrow::array::ArrayRef,
        )>,
    > {
        self.component.to_arrow()
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum LogContainerParsingError {
    #[error("Failed to tensor data to Vec<{}> due to {}", .0, .1)]
    VecParsingError(String, String),
    #[error("Unable to build an array of shape {:?} due to {}", .0, .1)]
    ShapeError(Vec<usize>, String),
    #[error("failed to convert from image due to {}", .0)]
    ImageConstructionError(String),
}

#[derive(Default, Clone, Debug, PartialEq)]
pub enum ImageGridOptions {
    Columns(usize),
    Rows(usize),
    Exact {
        rows: usize,
        columns: usize,
    },
    #[default]
    Auto,
}

impl ImageGridOptions {
    /// Zero rows or columns fall back to [`ImageGridOptions::Auto`].
    fn into_row_column(self, batch_size: usize) -> (usize, usize) {
        match self {
            ImageGridOptions::Columns(c) if c > 0 => (batch_size.div_ceil(c), c),
            ImageGridOptions::Rows(r) if r > 0 => (r, batch_size.div_ceil(r)),
            ImageGridOptions::Exact { rows, columns }
                if columns > 0 && rows * columns >= batch_size =>
            {
                (rows, columns)
            }
            ImageGridOptions::Exact { columns, .. } if columns > 0 => {
                (batch_size.div_ceil(columns), columns)
            }
            _ => {
                let root = (batch_size as f32).sqrt();
                if root % 1. == 0. {
                    (root as usize, root as usize)
                } else {
                    ((root.floor() as usize + 1), root.round() as usize)
                }
            }
        }
    }
}

impl LogContainer<rerun::Image> {
    /// Converts burn tensor into a logcontainer that will log an image.
    /// This function assumes the following tensor shape: [height, width, rgb_color/rbga_color]
    pub fn from_burn_3d_tensoru8<B: Backend>(
        burn_tensor: Tensor<B, 3, Int>,
    ) -> Result<Self, LogContainerParsingError> {
        let [h, w, c] = burn_tensor.dims();
        let tensor_vec = burn_tensor
            .to_data()
            .convert::<u8>()
            .into_vec::<u8>()
            .map_err(|e| LogContainerParsingError::VecParsingError("u8".into(), format!("{:?}", e)))?;
        let nd = ndarray::Array3::<u8>::from_shape_vec((h, w, c), tensor_vec)
            .map_err(|e| LogContainerParsingError::ShapeError(vec![h, w, c], e.to_string()))?;

        let color_model = match c {
            1 => rerun::ColorModel::L,
            3 => rerun::ColorModel::RGB,
            4 => rerun::ColorModel::RGBA,
            c => {
                return Err(LogContainerParsingError::ImageConstructionError(format!(
                    "{} is not a valid option for the color channel! choose either 1 (L), 3 (rgb) or 4 (rgba)",
                    c
                )));
            }
        };
        let image = rerun::Image::from_color_model_and_tensor(color_model, nd)
            .map_err(|e| LogContainerParsingError::ImageConstructionError(format!("{:?}", e)))?;
        Ok(Self { component: image })
    }

    /// Converts burn tensor into a logcontainer that will log an image grid.
    /// This function assumes the following tensor shape: [batch, height, width, rgb_color/rbga_color]
    pub fn from_burn_4d_tensoru8<B: Backend>(
        burn_tensor: Tensor<B, 4, Int>,
        grid_settings: ImageGridOptions,
    ) -> Result<Self, LogContainerParsingError> {
        let [b, h, w, c] = burn_tensor.dims();

        if b == 1 {
            return Self::from_burn_3d_tensoru8(burn_tensor.reshape([h, w, c]));
        }

        let (rows, columns) = grid_settings.into_row_column(b);

        let mut stitched_tensor: Tensor<B, 3, Int> =
            Tensor::zeros([rows * h, columns * w, c], &burn_tensor.device());

        for i in 0..b {
            let start_row = (i / columns) * h;
            let start_col = (i % columns) * w;

            let slice = burn_tensor.clone().slice([i..i + 1, 0..h, 0..w, 0..c]);
            stitched_tensor = stitched_tensor.slice_assign(
                [start_row..start_row + h, start_col..start_col + w, 0..c],
                slice.reshape([h, w, c]),
            );
        }
        Self::from_burn_3d_tensoru8(stitched_tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_from_burn_4d_tensoru8() {
        let tensor: Tensor<TestBackend, 4, Int> = Tensor::from_data(
            [[[[1], [2]], [[3], [4]]], [[[5], [6]], [[7], [8]]]],
            &Default::default(),
        );
        let log_container = LogContainer::from_burn_4d_tensoru8(tensor, ImageGridOptions::Auto);
        assert!(log_container.is_ok());
    }

    #[test]
    fn test_rejects_two_channels() {
        let tensor: Tensor<TestBackend, 3, Int> = Tensor::from_data(
            TensorData::new(vec![0u8; 8], [2, 2, 2]),
            &Default::default(),
        );
        assert!(LogContainer::from_burn_3d_tensoru8(tensor).is_err());
    }

    #[test]
    fn test_auto_batch_size_2() {
        let (rows, columns) = ImageGridOptions::Auto.into_row_column(2);
        assert_eq!(rows, 2);
        assert_eq!(columns, 1);
    }

    #[test]
    fn test_auto_batch_size_3() {
        let (rows, columns) = ImageGridOptions::Auto.into_row_column(3);
        assert_eq!(rows, 2);
        assert_eq!(columns, 2);
    }

    #[test]
    fn test_zero_rows_or_columns_fall_back_to_auto() {
        let auto = ImageGridOptions::Auto.into_row_column(3);
        assert_eq!(ImageGridOptions::Columns(0).into_row_column(3), auto);
        assert_eq!(ImageGridOptions::Rows(0).into_row_column(3), auto);
        assert_eq!(
            ImageGridOptions::Exact { rows: 2, columns: 0 }.into_row_column(3),
            auto
        );
    }

    #[test]
    fn test_columns_fit_batch() {
        assert_eq!(ImageGridOptions::Columns(2).into_row_column(4), (2, 2));
        assert_eq!(ImageGridOptions::Columns(2).into_row_column(5), (3, 2));
        assert_eq!(
            ImageGridOptions::Exact { rows: 1, columns: 2 }.into_row_column(3),
            (2, 2)
        );
    }
}
