use anyhow::{anyhow, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Number of output classes every supported model is trained for.
pub const NUM_CLASSES: usize = 2;

/// Square input resolution both architectures expect.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Supported classifier architectures.
///
/// Both are exported with their final layer resized to `NUM_CLASSES`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelArch {
    Resnet34,
    MobilenetV3Small,
}

impl ModelArch {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelArch::Resnet34 => "resnet34",
            ModelArch::MobilenetV3Small => "mobilenet_v3_small",
        }
    }

    /// Model file used when no explicit path is configured.
    pub fn default_model_path(self) -> PathBuf {
        match self {
            ModelArch::Resnet34 => PathBuf::from("models/resnet34_2class.onnx"),
            ModelArch::MobilenetV3Small => PathBuf::from("models/mobilenet_v3_small_2class.onnx"),
        }
    }

    pub fn input_size(self) -> u32 {
        DEFAULT_INPUT_SIZE
    }
}

impl Default for ModelArch {
    fn default() -> Self {
        ModelArch::MobilenetV3Small
    }
}

impl fmt::Display for ModelArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelArch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "resnet34" => Ok(ModelArch::Resnet34),
            "mobilenet_v3_small" | "mobilenet" => Ok(ModelArch::MobilenetV3Small),
            other => Err(anyhow!(
                "unknown model architecture '{}'; expected resnet34 or mobilenet_v3_small",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_architecture_names() {
        assert_eq!("resnet34".parse::<ModelArch>().unwrap(), ModelArch::Resnet34);
        assert_eq!(
            "MobileNet-V3-Small".parse::<ModelArch>().unwrap(),
            ModelArch::MobilenetV3Small
        );
        assert!("vgg16".parse::<ModelArch>().is_err());
    }

    #[test]
    fn default_paths_follow_architecture() {
        assert_eq!(
            ModelArch::Resnet34.default_model_path(),
            PathBuf::from("models/resnet34_2class.onnx")
        );
        assert_eq!(ModelArch::default(), ModelArch::MobilenetV3Small);
    }
}
