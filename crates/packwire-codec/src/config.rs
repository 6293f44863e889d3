use serde::{Deserialize, Serialize};

/// Default limit on container nesting while decoding.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Concrete mapping type built for map data decoded into an open target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapContainer {
    /// `Value::Map` with text keys. Maps with any non-text key fall back to
    /// `Value::AnyMap`.
    #[default]
    TextKeyed,
    /// Always `Value::AnyMap`, keys kept as open values in wire order.
    AnyKeyed,
}

/// Granularity of the timestamp extension's tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampResolution {
    #[default]
    Micro,
    Nano,
}

impl TimestampResolution {
    /// Nanoseconds per tick.
    pub fn nanos_per_tick(self) -> i64 {
        match self {
            TimestampResolution::Micro => 1_000,
            TimestampResolution::Nano => 1,
        }
    }
}

/// Options that resolve ambiguous cases while decoding.
///
/// Read-only once built; share it behind an `Arc` between decoders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Mapping type built for map data in open targets.
    pub map_container_type: MapContainer,
    /// Integers in `-128..=127` decode into open targets as `Value::Int8`
    /// instead of a 64-bit form.
    pub small_uint_as_narrow_int: bool,
    /// Binary data that is valid UTF-8 decodes into open targets as text.
    pub decode_raw_as_text_when_ambiguous: bool,
    /// Resolution used to interpret timestamp extension payloads.
    pub timestamp_resolution: TimestampResolution,
    /// Hint that repeated strings may be shared. Has no effect on results.
    pub string_interning: bool,
    /// Match record field names ignoring ASCII case.
    pub case_insensitive_fields: bool,
    /// Keep unknown extension types as `Value::Extension` instead of failing.
    pub keep_unknown_extensions: bool,
    /// Maximum container nesting depth.
    pub max_depth: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            map_container_type: MapContainer::TextKeyed,
            small_uint_as_narrow_int: true,
            decode_raw_as_text_when_ambiguous: false,
            timestamp_resolution: TimestampResolution::Micro,
            string_interning: false,
            case_insensitive_fields: false,
            keep_unknown_extensions: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeConfig {
    pub fn with_map_container_type(mut self, container: MapContainer) -> Self {
        self.map_container_type = container;
        self
    }

    pub fn with_small_uint_as_narrow_int(mut self, enabled: bool) -> Self {
        self.small_uint_as_narrow_int = enabled;
        self
    }

    pub fn with_raw_as_text(mut self, enabled: bool) -> Self {
        self.decode_raw_as_text_when_ambiguous = enabled;
        self
    }

    pub fn with_timestamp_resolution(mut self, resolution: TimestampResolution) -> Self {
        self.timestamp_resolution = resolution;
        self
    }

    pub fn with_string_interning(mut self, enabled: bool) -> Self {
        self.string_interning = enabled;
        self
    }

    pub fn with_case_insensitive_fields(mut self, enabled: bool) -> Self {
        self.case_insensitive_fields = enabled;
        self
    }

    pub fn with_unknown_extensions(mut self, keep: bool) -> Self {
        self.keep_unknown_extensions = keep;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Options applied while encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Resolution of the tick count written for timestamps.
    pub timestamp_resolution: TimestampResolution,
}
