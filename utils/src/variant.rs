use std::str::FromStr;

/// `--variant` argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantKind {
    Eval,
    Move,
    Zero,
}

impl FromStr for VariantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eval" => Ok(Self::Eval),
            "move" => Ok(Self::Move),
            "zero" => Ok(Self::Zero),
            _ => Err(format!("Unrecognised variant `{s}`! Supported: 'eval', 'move', 'zero'.")),
        }
    }
}

/// Calls a generic function with the network variant selected by `$kind`.
macro_rules! with_variant {
    ($kind:expr, $loss:expr, $f:ident($($arg:expr),* $(,)?)) => {
        match $kind {
            $crate::variant::VariantKind::Eval => $f(halfkp_trainer::Eval { loss: $loss }, $($arg),*),
            $crate::variant::VariantKind::Move => $f(halfkp_trainer::Move, $($arg),*),
            $crate::variant::VariantKind::Zero => $f(halfkp_trainer::Zero, $($arg),*),
        }
    };
}

pub(crate) use with_variant;
