//! Operation-specific response shapes.
//!
//! Success and degraded responses share one shape per operation: a degraded
//! response differs only in `success = false` and a populated
//! `error_message`.

use serde::{Deserialize, Serialize};

use crate::gateway::operation::ResponseSchema;
use crate::observability::CorrelationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One plate when several are detected in the same image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateInfo {
    pub plate_number: String,
    pub confidence: f64,
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensePlateResponse {
    pub success: bool,
    pub request_id: Option<String>,
    pub plate_number: Option<String>,
    pub confidence: Option<f64>,
    pub bounding_box: Option<BoundingBox>,
    pub vehicle_type: Option<String>,
    pub processing_time_ms: Option<u64>,
    pub plates: Option<Vec<PlateInfo>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f64,
    /// `[x1, y1, x2, y2]`
    pub bbox: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionResponse {
    pub success: bool,
    pub detections: Vec<Detection>,
    pub count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionResponse {
    pub success: bool,
    pub text: Option<String>,
    pub language: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundRemovalResponse {
    pub success: bool,
    /// Base64-encoded PNG.
    pub image: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionResponse {
    pub success: bool,
    pub caption: Option<String>,
    pub error_message: Option<String>,
}

/// Response of any operation, serialized as the inner shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationResponse {
    LicensePlate(LicensePlateResponse),
    Detection(DetectionResponse),
    Transcription(TranscriptionResponse),
    BackgroundRemoval(BackgroundRemovalResponse),
    Caption(CaptionResponse),
}

impl OperationResponse {
    /// Decode an upstream body into the schema's shape.
    pub fn decode(
        schema: ResponseSchema,
        body: &[u8],
        correlation_id: &CorrelationId,
    ) -> Result<Self, serde_json::Error> {
        Ok(match schema {
            ResponseSchema::LicensePlate => {
                let mut response: LicensePlateResponse = serde_json::from_slice(body)?;
                if response.request_id.is_none() {
                    response.request_id = Some(correlation_id.to_string());
                }
                Self::LicensePlate(response)
            }
            ResponseSchema::Detection => {
                let mut response: DetectionResponse = serde_json::from_slice(body)?;
                if response.count == 0 {
                    response.count = response.detections.len();
                }
                Self::Detection(response)
            }
            ResponseSchema::Transcription => Self::Transcription(serde_json::from_slice(body)?),
            ResponseSchema::BackgroundRemoval => Self::BackgroundRemoval(serde_json::from_slice(body)?),
            ResponseSchema::Caption => Self::Caption(serde_json::from_slice(body)?),
        })
    }

    /// Empty shape for `schema` with `success = false` and `reason` as message.
    pub fn degraded(schema: ResponseSchema, reason: String, correlation_id: &CorrelationId) -> Self {
        let error_message = Some(reason);
        match schema {
            ResponseSchema::LicensePlate => Self::LicensePlate(LicensePlateResponse {
                request_id: Some(correlation_id.to_string()),
                error_message,
                ..Default::default()
            }),
            ResponseSchema::Detection => Self::Detection(DetectionResponse {
                error_message,
                ..Default::default()
            }),
            ResponseSchema::Transcription => Self::Transcription(TranscriptionResponse {
                error_message,
                ..Default::default()
            }),
            ResponseSchema::BackgroundRemoval => Self::BackgroundRemoval(BackgroundRemovalResponse {
                error_message,
                ..Default::default()
            }),
            ResponseSchema::Caption => Self::Caption(CaptionResponse {
                error_message,
                ..Default::default()
            }),
        }
    }

    pub fn success(&self) -> bool {
        match self {
            Self::LicensePlate(r) => r.success,
            Self::Detection(r) => r.success,
            Self::Transcription(r) => r.success,
            Self::BackgroundRemoval(r) => r.success,
            Self::Caption(r) => r.success,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::LicensePlate(r) => r.error_message.as_deref(),
            Self::Detection(r) => r.error_message.as_deref(),
            Self::Transcription(r) => r.error_message.as_deref(),
            Self::BackgroundRemoval(r) => r.error_message.as_deref(),
            Self::Caption(r) => r.error_message.as_deref(),
        }
    }
}
