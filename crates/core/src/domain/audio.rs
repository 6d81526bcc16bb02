//! Audio-facing error type and channel identifiers
//!
//! Everything the host shell can get wrong when driving the engine ends up
//! here. Variants returned from the audio path carry only `Copy` data so that
//! building one never touches the allocator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while preparing or running the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EqError {
    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Sample rate is not a positive finite number
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    /// `process_block` was called before `prepare`
    #[error("Engine used before prepare()")]
    NotPrepared,

    /// Left and right buffers differ in length
    #[error("Channel length mismatch: left={left}, right={right}")]
    ChannelLengthMismatch { left: usize, right: usize },

    /// Block exceeds the size announced in `prepare`
    #[error("Block of {len} samples exceeds prepared maximum of {max}")]
    BlockTooLarge { len: usize, max: usize },

    /// Interleaved stereo buffer does not hold whole frames
    #[error("Interleaved buffer length {0} is not a multiple of 2")]
    OddInterleavedLength(usize),
}

pub type Result<T> = std::result::Result<T, EqError>;

/// One of the two channels of the stereo signal path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    pub fn index(&self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_index() {
        assert_eq!(Channel::Left.index(), 0);
        assert_eq!(Channel::Right.index(), 1);
        assert_eq!(Channel::ALL.len(), 2);
    }

    #[test]
    fn test_error_messages() {
        let err = EqError::ChannelLengthMismatch { left: 64, right: 32 };
        assert_eq!(err.to_string(), "Channel length mismatch: left=64, right=32");

        let err = EqError::BlockTooLarge { len: 1024, max: 512 };
        assert!(err.to_string().contains("1024"));
    }
}
