use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalcError {
    #[error("Invalid expected volume: {value} (must be a finite number >= 0)")]
    InvalidExpectedVolume { value: f64 },

    #[error("Non-finite {field} for subchannel '{subchannel}'")]
    NonFiniteOutput { subchannel: String, field: &'static str },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid period '{raw}': expected YYYYMM or YYYY-MM")]
    InvalidPeriod { raw: String },
}

pub type CalcResult<T> = Result<T, CalcError>;
