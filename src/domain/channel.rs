use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named broker channels the service reads from and writes to.
///
/// Input channels carry commands, output channels carry outcome events.
/// Names are short on purpose: they are the binding names, not topic names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// ConfirmAccountCreation commands.
    Cac,
    /// ConfirmMoneyTransfer commands.
    Cmt,
    /// Account creation failed.
    Acco,
    /// Account creation confirmed.
    Acfa,
    /// Money transfer confirmed.
    Mtco,
    /// Money transfer failed.
    Mtfa,
    /// Balance changed.
    Bach,
}

impl Channel {
    pub const INPUTS: [Channel; 2] = [Channel::Cac, Channel::Cmt];
    pub const OUTPUTS: [Channel; 5] = [
        Channel::Acco,
        Channel::Acfa,
        Channel::Mtco,
        Channel::Mtfa,
        Channel::Bach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Cac => "cac",
            Channel::Cmt => "cmt",
            Channel::Acco => "acco",
            Channel::Acfa => "acfa",
            Channel::Mtco => "mtco",
            Channel::Mtfa => "mtfa",
            Channel::Bach => "bach",
        }
    }

    pub fn is_input(&self) -> bool {
        Self::INPUTS.contains(self)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::INPUTS
            .iter()
            .chain(Self::OUTPUTS.iter())
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown channel '{}'", s))
    }
}
