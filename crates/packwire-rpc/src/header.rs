use packwire_codec::record;

record! {
    /// Envelope sent ahead of every request and response body.
    ///
    /// Travels as a map keyed `service_method`, `sequence`, `error`.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Header {
        /// Target procedure, e.g. `"Arith.Multiply"`.
        pub service_method: String,
        /// Caller-chosen id echoed back in the matching response.
        pub sequence: u64,
        /// Empty on success; the failure message otherwise.
        pub error: String,
    }
}

impl Header {
    pub fn request(service_method: impl Into<String>, sequence: u64) -> Self {
        Self {
            service_method: service_method.into(),
            sequence,
            error: String::new(),
        }
    }

    /// A response header answering `request`.
    pub fn reply_to(request: &Header) -> Self {
        Self::request(request.service_method.clone(), request.sequence)
    }

    /// A failed response header answering `request`.
    pub fn error_reply(request: &Header, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::reply_to(request)
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use packwire_codec::{marshal, unmarshal, DecodeConfig, EncodeOptions, Value};

    use super::*;

    #[test]
    fn header_is_a_keyed_map() {
        let header = Header::request("Arith.Add", 7);
        let bytes = marshal(&header, &EncodeOptions::default()).unwrap();
        let open: Value = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(open.get("service_method").and_then(Value::as_str), Some("Arith.Add"));
        assert_eq!(open.get("sequence").and_then(Value::as_u64), Some(7));
        assert_eq!(open.get("error").and_then(Value::as_str), Some(""));

        let back: Header = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn replies_echo_the_request() {
        let req = Header::request("Arith.Div", u64::MAX);
        let ok = Header::reply_to(&req);
        assert_eq!(ok.sequence, u64::MAX);
        assert!(!ok.is_error());

        let failed = Header::error_reply(&req, "divide by zero");
        assert_eq!(failed.service_method, "Arith.Div");
        assert!(failed.is_error());
    }
}
