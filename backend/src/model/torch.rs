use std::path::Path;
use std::sync::{Arc, Mutex};

use image::RgbImage;
use ndarray::{Array2, Array3};
use tch::{CModule, Device, IValue, Kind, Tensor};

use super::yolo::{self, DecodeParams};
use super::{Detections, InferenceEngine, InferenceError, ModelLoadError};

/// TorchScript export of a YOLO segmentation network.
#[derive(Clone)]
pub struct TorchEngine {
    model: Arc<Mutex<CModule>>,
    device: Device,
    params: DecodeParams,
}

impl TorchEngine {
    pub fn load(model_path: &str, params: DecodeParams) -> Result<Self, ModelLoadError> {
        if !Path::new(model_path).exists() {
            return Err(ModelLoadError::NotFound(model_path.to_string()));
        }
        let device = Device::cuda_if_available();
        let model = CModule::load_on_device(model_path, device)?;
        log::info!("Loaded TorchScript model from {} on {:?}", model_path, device);
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
            params,
        })
    }

    fn forward(&self, input: Tensor) -> Result<(Tensor, Tensor), InferenceError> {
        let model = self
            .model
            .lock()
            .map_err(|_| InferenceError::Engine("model lock poisoned".into()))?;
        let output = tch::no_grad(|| model.forward_is(&[IValue::Tensor(input)]))?;

        match output {
            IValue::Tuple(mut values) | IValue::GenericList(mut values) if values.len() >= 2 => {
                let protos = values.swap_remove(1);
                let preds = values.swap_remove(0);
                match (preds, protos) {
                    (IValue::Tensor(preds), IValue::Tensor(protos)) => Ok((preds, protos)),
                    _ => Err(InferenceError::OutputShape("outputs are not tensors".into())),
                }
            }
            _ => Err(InferenceError::OutputShape(
                "expected (predictions, prototypes) output pair".into(),
            )),
        }
    }
}

fn to_vec(tensor: &Tensor) -> Result<Vec<f32>, InferenceError> {
    let flat = tensor.to_device(Device::Cpu).to_kind(Kind::Float).contiguous().view([-1]);
    Ok(Vec::<f32>::try_from(&flat)?)
}

impl InferenceEngine for TorchEngine {
    fn infer(&self, image: &RgbImage) -> Result<Detections, InferenceError> {
        let (input, letterbox) = yolo::letterbox(image, self.params.input_size);
        let side = self.params.input_size as i64;
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Engine("input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_slice(data)
            .view([1, 3, side, side])
            .to_device(self.device);

        let (preds, protos) = self.forward(tensor)?;

        let preds_size = preds.size();
        let protos_size = protos.size();
        let (rows, anchors) = match preds_size.as_slice() {
            [1, rows, anchors] => (*rows as usize, *anchors as usize),
            other => {
                return Err(InferenceError::OutputShape(format!("predictions {:?}", other)));
            }
        };
        let (coeffs, proto_h, proto_w) = match protos_size.as_slice() {
            [1, c, h, w] => (*c as usize, *h as usize, *w as usize),
            other => {
                return Err(InferenceError::OutputShape(format!("prototypes {:?}", other)));
            }
        };

        let preds = Array2::from_shape_vec((rows, anchors), to_vec(&preds)?)
            .map_err(|e| InferenceError::OutputShape(e.to_string()))?;
        let protos = Array3::from_shape_vec((coeffs, proto_h, proto_w), to_vec(&protos)?)
            .map_err(|e| InferenceError::OutputShape(e.to_string()))?;

        yolo::decode(preds.view(), protos.view(), &letterbox, &self.params)
    }
}
