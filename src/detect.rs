use std::sync::OnceLock;

const UNKNOWN_CLIENT: &str = "unknown";

/// How a screenshot reaches the agent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryMode {
    /// Base64 image content embedded in the tool result.
    Inline,
    /// Image written to disk; the result carries its path for the agent to open.
    FilePath,
}

/// Ordered (lower-case substring, mode) rules over the MCP client name. The first
/// matching rule wins; names matching nothing get `default`.
#[derive(Clone, Debug)]
pub struct CompatibilityTable {
    rules: Vec<(String, DeliveryMode)>,
    default: DeliveryMode,
}

impl CompatibilityTable {
    pub fn new(default: DeliveryMode) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    pub fn with_rule(mut self, pattern: impl Into<String>, mode: DeliveryMode) -> Self {
        self.rules.push((pattern.into().to_lowercase(), mode));
        self
    }

    pub fn classify(&self, client_name: &str) -> DeliveryMode {
        let name = client_name.to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| name.contains(pattern.as_str()))
            .map_or(self.default, |(_, mode)| *mode)
    }
}

/// Terminal coding agents (`claude-code`, `vscode`, ...) read images from disk;
/// desktop chat clients render inline content.
impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::new(DeliveryMode::Inline).with_rule("code", DeliveryMode::FilePath)
    }
}

/// Decides the delivery mode once, from the first client name it sees, and
/// answers the same for the rest of the process.
#[derive(Debug, Default)]
pub struct CapabilityDetector {
    table: CompatibilityTable,
    detected: OnceLock<(String, DeliveryMode)>,
}

impl CapabilityDetector {
    pub fn new(table: CompatibilityTable) -> Self {
        Self {
            table,
            detected: OnceLock::new(),
        }
    }

    pub fn delivery_mode(&self, client_name: Option<&str>) -> DeliveryMode {
        let (_, mode) = self.detected.get_or_init(|| {
            let name = client_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(UNKNOWN_CLIENT)
                .to_string();
            let mode = self.table.classify(&name);
            tracing::info!(client = %name, ?mode, "MCP client detected");
            (name, mode)
        });
        *mode
    }

    pub fn prefers_file_delivery(&self, client_name: Option<&str>) -> bool {
        self.delivery_mode(client_name) == DeliveryMode::FilePath
    }

    /// Name recorded at first detection, if detection already ran.
    pub fn detected_client(&self) -> Option<&str> {
        self.detected.get().map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityDetector, CompatibilityTable, DeliveryMode};

    #[test]
    fn stock_table_sends_code_clients_to_file_delivery() {
        let table = CompatibilityTable::default();
        assert_eq!(table.classify("claude-code"), DeliveryMode::FilePath);
        assert_eq!(table.classify("Visual Studio Code"), DeliveryMode::FilePath);
        assert_eq!(table.classify("claude-desktop"), DeliveryMode::Inline);
        assert_eq!(table.classify("unknown"), DeliveryMode::Inline);
    }

    #[test]
    fn first_rule_wins() {
        let table = CompatibilityTable::new(DeliveryMode::FilePath)
            .with_rule("Desktop", DeliveryMode::Inline)
            .with_rule("desk", DeliveryMode::FilePath);
        assert_eq!(table.classify("claude-desktop"), DeliveryMode::Inline);
        assert_eq!(table.classify("cursor"), DeliveryMode::FilePath);
    }

    #[test]
    fn detection_is_memoized_after_first_call() {
        let detector = CapabilityDetector::default();
        assert!(detector.prefers_file_delivery(Some("claude-code")));
        assert!(detector.prefers_file_delivery(Some("claude-desktop")));
        assert!(detector.prefers_file_delivery(None));
        assert_eq!(detector.detected_client(), Some("claude-code"));
    }

    #[test]
    fn missing_name_reads_as_unknown() {
        let detector = CapabilityDetector::default();
        assert!(!detector.prefers_file_delivery(None));
        assert_eq!(detector.detected_client(), Some("unknown"));
    }
}
