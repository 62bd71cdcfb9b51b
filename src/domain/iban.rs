//! IBAN and token helpers.
//!
//! Accounts held by this service carry an *open* IBAN: Dutch country code, bank code
//! `OPEN` and a ten digit account number, e.g. `NL39OPEN0000000001`.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Source used for deposits that do not originate from an account.
pub const CASH: &str = "cash";

const OPEN_COUNTRY: &str = "NL";
const OPEN_BANK: &str = "OPEN";
const OPEN_IBAN_LEN: usize = 18;
const TOKEN_LEN: usize = 20;

/// ISO 7064 mod-97 over the IBAN alphabet, letters expanding to two digits.
fn mod97(chars: impl Iterator<Item = char>) -> Option<u32> {
    let mut remainder = 0u32;
    for c in chars {
        remainder = match c {
            '0'..='9' => (remainder * 10 + c.to_digit(10)?) % 97,
            'A'..='Z' => (remainder * 100 + (c as u32 - 'A' as u32 + 10)) % 97,
            _ => return None,
        };
    }
    Some(remainder)
}

/// Structural and checksum validation of any IBAN.
pub fn valid_iban(iban: &str) -> bool {
    if !(15..=34).contains(&iban.len()) || !iban.is_ascii() {
        return false;
    }
    let bytes = iban.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_uppercase) || !bytes[2..4].iter().all(u8::is_ascii_digit)
    {
        return false;
    }
    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    mod97(rearranged) == Some(1)
}

/// Whether the IBAN belongs to an account held by this service.
pub fn valid_open_iban(iban: &str) -> bool {
    iban.len() == OPEN_IBAN_LEN
        && iban.is_ascii()
        && iban.starts_with(OPEN_COUNTRY)
        && &iban[4..8] == OPEN_BANK
        && iban[8..].bytes().all(|b| b.is_ascii_digit())
        && valid_iban(iban)
}

/// A transfer may originate from cash or any valid IBAN.
pub fn valid_from(from: &str) -> bool {
    from == CASH || valid_iban(from)
}

pub fn valid_token(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn check_digits(country: &str, bban: &str) -> Option<u32> {
    let remainder = mod97(bban.chars().chain(country.chars()).chain("00".chars()))?;
    Some(98 - remainder)
}

/// Builds the open IBAN for a ten digit account number.
pub fn open_iban(account_number: u64) -> String {
    let bban = format!("{}{:010}", OPEN_BANK, account_number % 10_000_000_000);
    // Alphabet is fixed above, mod97 cannot fail here.
    let check = check_digits(OPEN_COUNTRY, &bban).unwrap_or_default();
    format!("{}{:02}{}", OPEN_COUNTRY, check, bban)
}

pub fn new_iban<R: Rng + ?Sized>(rng: &mut R) -> String {
    open_iban(rng.gen_range(0..10_000_000_000))
}

pub fn new_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
