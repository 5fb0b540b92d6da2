//! Detection model implementations.
//!
//! Models handle preprocessing, inference, and postprocessing themselves.

pub mod yolo;

pub use yolo::{
    COCO_CLASSES, Detection, PERSON_CLASS_ID, YoloConfig, YoloModel, YoloModelBuilder,
    decode_yolo_output,
};
