//! Ticket payload carried inside the QR code.

use serde::{Deserialize, Serialize};

use super::registration::Registration;

/// Data encoded in an attendee's QR ticket.
///
/// The wire names are fixed by tickets already handed out, so they are kept
/// as-is rather than following the API's camelCase convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    pub id: i64,
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evento: Option<String>,
}

impl TicketPayload {
    pub fn for_registration(registration: &Registration, event: &str) -> Self {
        Self {
            id: registration.id,
            nombre: registration.full_name.clone(),
            telefono: Some(registration.phone.clone()),
            evento: Some(event.to_string()),
        }
    }
}

/// Output image format for a rendered ticket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketFormat {
    #[default]
    Png,
    Svg,
}

impl TicketFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            TicketFormat::Png => "image/png",
            TicketFormat::Svg => "image/svg+xml",
        }
    }
}

/// A rendered ticket image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketImage {
    pub format: TicketFormat,
    pub bytes: Vec<u8>,
}

/// Ticket as returned to the attendee after registering.
///
/// `qr_data_url` is absent when the image could not be rendered; the
/// registration stands and the ticket can be downloaded later.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub payload: TicketPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_data_url: Option<String>,
}
