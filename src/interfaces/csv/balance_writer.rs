use crate::domain::balance::Balance;
use crate::error::Result;
use std::io::Write;

/// Writes a balance snapshot as CSV: `balance_id,iban,type,amount,lmt`.
///
/// Amounts are rendered with two fraction digits.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, balances: Vec<Balance>) -> Result<()> {
        self.writer
            .write_record(["balance_id", "iban", "type", "amount", "lmt"])?;
        for balance in balances {
            self.writer.write_record([
                balance.balance_id.to_string(),
                balance.iban.clone(),
                balance.a_type.to_string(),
                balance.display_amount().to_string(),
                balance.lmt.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance::AccountType;
    use chrono::Utc;

    #[test]
    fn test_write_snapshot() {
        let mut balance = Balance::open(
            "NL39OPEN0000000001".into(),
            "token".into(),
            AccountType::Manual,
            Utc::now(),
        );
        balance.balance_id = 3;
        balance.amount = 7005;
        balance.lmt = 6;

        let mut out = Vec::new();
        BalanceWriter::new(&mut out).write_balances(vec![balance]).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "balance_id,iban,type,amount,lmt",
                "3,NL39OPEN0000000001,MANUAL,70.05,6"
            ]
        );
    }
}
