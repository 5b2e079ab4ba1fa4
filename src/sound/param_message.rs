//! Structure used to pass control messages to the audio engine
//!
//! The control loop owns the terminal; the engine owns the audio thread.
//! Everything the user can change travels through one of these over an
//! mpsc channel, polled non-blockingly once per block.
use serde_json::json;
use std::fmt;

#[derive(FromPrimitive, ToPrimitive, Clone, Copy, Debug, PartialEq)]
pub enum DspParam {
    SetOutputMode = 0,
    AdjustGain = 1,
    ResetGain = 2,
    SetEnergyMode = 3,
    SetPeriodMode = 4,
    SetSampleRate = 5,
    StopAudio = 6,
}

pub struct ParamMessage {
    pub param: DspParam,
    pub ivalue: i64,
    pub fvalue: f64,
}

impl ParamMessage {
    pub fn new(param: DspParam, ivalue: i64, fvalue: f64) -> ParamMessage {
        ParamMessage {
            param,
            ivalue,
            fvalue,
        }
    }
    pub fn as_json(&self) -> serde_json::Value {
        json!({
          "param": self.param as i64,
          "iValue": self.ivalue,
          "fValue": self.fvalue,
        })
    }
}

impl fmt::Display for ParamMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ param: {:?}, ivalue: {}, fvalue: {} }}",
            self.param, self.ivalue, self.fvalue
        )
    }
}

#[cfg(test)]
mod test_param_message {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn can_json() {
        let msg = ParamMessage::new(DspParam::AdjustGain, 0, 0.05);
        assert_eq!(msg.as_json()["param"], 1);
        assert_eq!(msg.as_json()["fValue"], 0.05);
    }

    #[test]
    fn round_trips_through_integers() {
        assert_eq!(DspParam::from_i64(4), Some(DspParam::SetPeriodMode));
        assert_eq!(DspParam::from_i64(99), None);
    }
}
