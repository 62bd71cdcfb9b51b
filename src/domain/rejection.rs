use thiserror::Error;

/// Why a command ended in a failed outcome.
///
/// The display text is what ends up as `reason` on the stored record and the
/// failure event, so it is part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("iban is invalid")]
    InvalidIban,
    #[error("token is invalid")]
    MalformedToken,
    #[error("iban already exists")]
    IbanTaken,
    #[error("generated iban already exists, try again")]
    GeneratedIbanTaken,
    #[error("from and to can't be same for transfer")]
    SameAccount,
    #[error("from is invalid")]
    InvalidFrom,
    #[error("to is invalid")]
    InvalidTo,
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("unknown iban {0}")]
    UnknownIban(String),
    #[error("invalid token")]
    InvalidToken,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("balance would overflow")]
    BalanceOverflow,
}

impl Rejection {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
