pub const SCREENSHOT_MIME_TYPE: &str = "image/webp";

/// One content block of a tool answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResponsePart {
    Text(String),
    Image { data: String, mime_type: String },
}

/// Transport-neutral tool answer. The first part is always the status line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolResponse {
    pub parts: Vec<ResponsePart>,
    /// Marks the answer as a tool-level error; it is still a normal result.
    pub failed: bool,
}

impl ToolResponse {
    pub fn ok(status: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text(status.into())],
            failed: false,
        }
    }

    pub fn failure(status: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text(status.into())],
            failed: true,
        }
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.parts.push(ResponsePart::Text(text.into()));
    }

    pub fn push(&mut self, part: ResponsePart) {
        self.parts.push(part);
    }

    pub fn status(&self) -> &str {
        match self.parts.first() {
            Some(ResponsePart::Text(text)) => text,
            _ => "",
        }
    }

    pub fn texts(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::Text(text) => Some(text.as_str()),
                ResponsePart::Image { .. } => None,
            })
            .collect()
    }

    pub fn images(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::Image { data, .. } => Some(data.as_str()),
                ResponsePart::Text(_) => None,
            })
            .collect()
    }
}
