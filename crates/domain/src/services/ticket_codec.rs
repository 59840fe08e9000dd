//! Ticket codec: turns a registration into a QR image and scanned QR text
//! back into a ticket payload.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::render::svg;
use qrcode::QrCode;
use serde_json::Value;
use std::io::Cursor;
use thiserror::Error;

use crate::models::registration::Registration;
use crate::models::ticket::{TicketFormat, TicketImage, TicketPayload};

/// Event name written into tickets when none is configured.
pub const DEFAULT_EVENT_IDENTIFIER: &str = "JAHAZIEL BAND - Concierto en Vivo";

/// Default minimum edge length of a rendered ticket, in pixels.
pub const DEFAULT_MIN_DIMENSION: u32 = 150;

const DARK_LUMA: u8 = 0x1a;
const LIGHT_LUMA: u8 = 0xff;
const DARK_HEX: &str = "#1a1a1a";
const LIGHT_HEX: &str = "#ffffff";

/// Why scanned text could not be read as a ticket.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("QR code does not contain valid ticket data")]
    MalformedPayload,

    #[error("QR code is missing the ticket id or attendee name")]
    IncompleteFields,
}

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Failed to build QR code: {0}")]
    Encode(String),

    #[error("Failed to render ticket image: {0}")]
    Render(String),
}

/// Encodes and decodes attendee tickets.
#[derive(Debug, Clone)]
pub struct TicketCodec {
    event: String,
    min_dimension: u32,
}

impl Default for TicketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_IDENTIFIER, DEFAULT_MIN_DIMENSION)
    }
}

impl TicketCodec {
    pub fn new(event: impl Into<String>, min_dimension: u32) -> Self {
        Self {
            event: event.into(),
            min_dimension,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn payload_for(&self, registration: &Registration) -> TicketPayload {
        TicketPayload::for_registration(registration, &self.event)
    }

    /// Compact JSON text stored in the QR code.
    pub fn payload_text(&self, registration: &Registration) -> Result<String, TicketError> {
        serde_json::to_string(&self.payload_for(registration))
            .map_err(|e| TicketError::Encode(e.to_string()))
    }

    /// Renders the ticket for a registration. Identical input gives identical bytes.
    pub fn encode(
        &self,
        registration: &Registration,
        format: TicketFormat,
    ) -> Result<TicketImage, TicketError> {
        let text = self.payload_text(registration)?;
        let code =
            QrCode::new(text.as_bytes()).map_err(|e| TicketError::Encode(e.to_string()))?;

        let bytes = match format {
            TicketFormat::Png => {
                let image = code
                    .render::<Luma<u8>>()
                    .min_dimensions(self.min_dimension, self.min_dimension)
                    .dark_color(Luma([DARK_LUMA]))
                    .light_color(Luma([LIGHT_LUMA]))
                    .quiet_zone(true)
                    .build();

                let mut buf = Vec::new();
                DynamicImage::ImageLuma8(image)
                    .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                    .map_err(|e| TicketError::Render(e.to_string()))?;
                buf
            }
            TicketFormat::Svg => code
                .render::<svg::Color>()
                .min_dimensions(self.min_dimension, self.min_dimension)
                .dark_color(svg::Color(DARK_HEX))
                .light_color(svg::Color(LIGHT_HEX))
                .quiet_zone(true)
                .build()
                .into_bytes(),
        };

        Ok(TicketImage { format, bytes })
    }

    /// PNG ticket as a `data:` URL, ready to embed or download.
    pub fn data_url(&self, registration: &Registration) -> Result<String, TicketError> {
        let image = self.encode(registration, TicketFormat::Png)?;
        Ok(format!(
            "data:{};base64,{}",
            image.format.content_type(),
            STANDARD.encode(&image.bytes)
        ))
    }

    /// Reads scanned QR text. `id` must be a positive integer and `nombre` a
    /// non-empty string; other fields are carried through as found.
    pub fn decode(text: &str) -> Result<TicketPayload, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|_| DecodeError::MalformedPayload)?;
        let object = value.as_object().ok_or(DecodeError::IncompleteFields)?;

        let id = object
            .get("id")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .ok_or(DecodeError::IncompleteFields)?;

        let nombre = object
            .get("nombre")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or(DecodeError::IncompleteFields)?;

        Ok(TicketPayload {
            id,
            nombre: nombre.to_string(),
            telefono: object.get("telefono").and_then(loose_text),
            evento: object.get("evento").and_then(loose_text),
        })
    }
}

fn loose_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registration(id: i64, name: &str) -> Registration {
        Registration {
            id,
            full_name: name.to_string(),
            phone: "555-1111".to_string(),
            address: "Calle 1".to_string(),
            organization: None,
            sponsor: None,
            attendance_confirmed: true,
            checked_in: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_payload_text_uses_configured_event() {
        let codec = TicketCodec::default();
        let text = codec.payload_text(&registration(42, "Ana Lopez")).unwrap();
        assert_eq!(
            text,
            r#"{"id":42,"nombre":"Ana Lopez","telefono":"555-1111","evento":"JAHAZIEL BAND - Concierto en Vivo"}"#
        );
    }

    #[test]
    fn test_decode_recovers_id_and_name() {
        let codec = TicketCodec::new("Test Event", 150);
        let text = codec.payload_text(&registration(42, "Ana López")).unwrap();

        let payload = TicketCodec::decode(&text).unwrap();
        assert_eq!(payload.id, 42);
        assert_eq!(payload.nombre, "Ana López");
        assert_eq!(payload.evento.as_deref(), Some("Test Event"));
    }

    #[test]
    fn test_decode_not_json() {
        assert_eq!(
            TicketCodec::decode("not json"),
            Err(DecodeError::MalformedPayload)
        );
        assert_eq!(TicketCodec::decode(""), Err(DecodeError::MalformedPayload));
    }

    #[test]
    fn test_decode_missing_fields() {
        assert_eq!(
            TicketCodec::decode(r#"{"foo":1}"#),
            Err(DecodeError::IncompleteFields)
        );
        assert_eq!(
            TicketCodec::decode(r#"{"id":1}"#),
            Err(DecodeError::IncompleteFields)
        );
        assert_eq!(
            TicketCodec::decode(r#"{"nombre":"Ana"}"#),
            Err(DecodeError::IncompleteFields)
        );
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        assert_eq!(
            TicketCodec::decode(r#"{"id":"7","nombre":"Ana"}"#),
            Err(DecodeError::IncompleteFields)
        );
        assert_eq!(
            TicketCodec::decode(r#"{"id":0,"nombre":"Ana"}"#),
            Err(DecodeError::IncompleteFields)
        );
        assert_eq!(
            TicketCodec::decode(r#"{"id":7,"nombre":"  "}"#),
            Err(DecodeError::IncompleteFields)
        );
        assert_eq!(
            TicketCodec::decode("[1,2,3]"),
            Err(DecodeError::IncompleteFields)
        );
        assert_eq!(TicketCodec::decode("42"), Err(DecodeError::IncompleteFields));
    }

    #[test]
    fn test_decode_carries_optional_fields_loosely() {
        let payload = TicketCodec::decode(r#"{"id":3,"nombre":"Ana","telefono":5551111}"#).unwrap();
        assert_eq!(payload.telefono.as_deref(), Some("5551111"));
        assert_eq!(payload.evento, None);
    }

    #[test]
    fn test_encode_png_is_deterministic() {
        let codec = TicketCodec::default();
        let reg = registration(9, "Ana");

        let first = codec.encode(&reg, TicketFormat::Png).unwrap();
        let second = codec.encode(&reg, TicketFormat::Png).unwrap();
        assert_eq!(first, second);
        assert_eq!(&first.bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_encode_png_respects_min_dimension() {
        let codec = TicketCodec::new("Test Event", 300);
        let image = codec
            .encode(&registration(9, "Ana"), TicketFormat::Png)
            .unwrap();

        let decoded = image::load_from_memory(&image.bytes).unwrap();
        assert!(decoded.width() >= 300);
        assert_eq!(decoded.width(), decoded.height());
    }

    /// Reads the QR code back out of a rendered PNG.
    fn scan_png(bytes: &[u8]) -> String {
        let image = image::load_from_memory(bytes).unwrap().to_luma8();
        let (width, height) = image.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one QR code");
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn test_rendered_png_scans_back_to_registration() {
        let codec = TicketCodec::default();
        let reg = registration(42, "Ana López");

        let image = codec.encode(&reg, TicketFormat::Png).unwrap();
        let payload = TicketCodec::decode(&scan_png(&image.bytes)).unwrap();

        assert_eq!(payload.id, 42);
        assert_eq!(payload.nombre, "Ana López");
        assert_eq!(payload.telefono.as_deref(), Some("555-1111"));
        assert_eq!(payload.evento.as_deref(), Some(DEFAULT_EVENT_IDENTIFIER));
    }

    #[test]
    fn test_data_url_scans_back_to_registration() {
        let codec = TicketCodec::new("Test Event", 300);
        let reg = registration(1500, "María José Hernández");

        let url = codec.data_url(&reg).unwrap();
        let encoded = url.split_once(",").unwrap().1;
        let bytes = STANDARD.decode(encoded).unwrap();
        let payload = TicketCodec::decode(&scan_png(&bytes)).unwrap();

        assert_eq!(payload.id, 1500);
        assert_eq!(payload.nombre, "María José Hernández");
    }

    #[test]
    fn test_encode_svg_uses_ticket_colors() {
        let codec = TicketCodec::default();
        let image = codec
            .encode(&registration(9, "Ana"), TicketFormat::Svg)
            .unwrap();
        let svg = String::from_utf8(image.bytes).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains(DARK_HEX));
    }

    #[test]
    fn test_data_url_prefix() {
        let codec = TicketCodec::default();
        let url = codec.data_url(&registration(9, "Ana")).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
