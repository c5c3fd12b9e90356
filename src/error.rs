pub type PageflipResult<T> = Result<T, PageflipError>;

#[derive(thiserror::Error, Debug)]
pub enum PageflipError {
    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("archive read error: {0}")]
    Archive(String),

    #[error("entry '{name}' declares {size} bytes, over the {limit} byte limit")]
    OversizedEntry { name: String, size: u64, limit: u64 },

    #[error("no displayable sources")]
    Empty,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PageflipError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            PageflipError::config("x")
                .to_string()
                .contains("config error:")
        );
        assert!(
            PageflipError::decode("x")
                .to_string()
                .contains("decode error:")
        );
        assert!(
            PageflipError::archive("x")
                .to_string()
                .contains("archive read error:")
        );
    }

    #[test]
    fn oversized_entry_names_the_offender() {
        let err = PageflipError::OversizedEntry {
            name: "huge.jpg".into(),
            size: 10,
            limit: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("huge.jpg"));
        assert!(msg.contains("10"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = PageflipError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
