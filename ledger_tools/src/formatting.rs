use std::fmt::Write;

use anyhow::Result;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};
use print_ledger_engine::traits::{EarningsSummary, SettlementResult, UnsettledBalance};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_balances(balances: &[UnsettledBalance]) -> String {
    if balances.is_empty() {
        return "No unsettled earnings".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Shop", "Earnings", "Net owed"]);
    for balance in balances {
        table.add_row(row![balance.shop_id, r->balance.count, r->balance.total_net]);
    }
    table.to_string()
}

pub fn format_settlement(settlement: &SettlementResult) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "Shop:       {}", settlement.shop_id)?;
    writeln!(f, "Reference:  {}", settlement.settlement_ref)?;
    writeln!(f, "Earnings:   {}", settlement.count)?;
    writeln!(f, "Payout:     {}", settlement.total_payout)?;
    write!(f, "Settled at: {}", settlement.settled_at.to_rfc3339())?;
    Ok(f)
}

pub fn format_summary(shop_id: &str, summary: &EarningsSummary) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "Earnings for shop {shop_id}")?;
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["", "Amount"]);
    table.add_row(row!["Gross", r->summary.total_gross]);
    table.add_row(row!["Platform fee", r->summary.total_platform_fee]);
    table.add_row(row!["Net", r->summary.total_net]);
    table.add_row(row!["Settled", r->summary.total_settled]);
    table.add_row(row!["Pending settlement", r->summary.pending_settlement]);
    write!(f, "{table}")?;
    Ok(f)
}

#[cfg(test)]
mod test {
    use print_ledger_engine::db_types::MinorUnits;

    use super::*;

    #[test]
    fn balances_table() {
        assert_eq!(format_balances(&[]), "No unsettled earnings");
        let balances = vec![
            UnsettledBalance { shop_id: "shop-1".into(), total_net: MinorUnits::from(4_600), count: 2 },
            UnsettledBalance { shop_id: "shop-2".into(), total_net: MinorUnits::from(230), count: 1 },
        ];
        let table = format_balances(&balances);
        assert!(table.contains("shop-1"));
        assert!(table.contains("shop-2"));
        assert!(table.contains("Net owed"));
    }

    #[test]
    fn summary_lists_every_total() {
        let summary = EarningsSummary {
            total_gross: MinorUnits::from(50),
            total_platform_fee: MinorUnits::from(4),
            total_net: MinorUnits::from(46),
            total_settled: MinorUnits::from(23),
            pending_settlement: MinorUnits::from(23),
        };
        let text = format_summary("shop-1", &summary).unwrap();
        for label in ["Gross", "Platform fee", "Net", "Settled", "Pending settlement"] {
            assert!(text.contains(label), "{label} missing from\n{text}");
        }
    }
}
