//! Per-run collection of comparison outcomes
//!
//! One `RunReport` is owned by each harness and passed around explicitly;
//! nothing about a run is kept in global state.

use parity_compare::{ComparisonResult, PartitionReport};

/// Everything a parity run compared, in the order it was compared
#[derive(Debug, Default)]
pub struct RunReport {
    pub comparisons: Vec<ComparisonResult>,
    pub partitions: Vec<NamedPartition>,
}

/// A partition check labelled with the endpoint and server it covers
#[derive(Debug)]
pub struct NamedPartition {
    pub name: String,
    pub report: PartitionReport,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_comparison(&mut self, result: ComparisonResult) -> &ComparisonResult {
        self.comparisons.push(result);
        &self.comparisons[self.comparisons.len() - 1]
    }

    pub fn record_partition(&mut self, name: &str, report: PartitionReport) -> &PartitionReport {
        self.partitions.push(NamedPartition {
            name: name.to_string(),
            report,
        });
        &self.partitions[self.partitions.len() - 1].report
    }

    pub fn total(&self) -> usize {
        self.comparisons.len() + self.partitions.len()
    }

    pub fn passed(&self) -> usize {
        self.comparisons.iter().filter(|c| c.passed).count()
            + self.partitions.iter().filter(|p| p.report.passed).count()
    }

    /// Check if every comparison and partition check passed
    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }

    /// Print summary of all results
    pub fn print_summary(&self) {
        println!("\n=== Parity Summary ===");

        for result in &self.comparisons {
            result.print_summary();
        }
        for partition in &self.partitions {
            partition.report.print_summary(&partition.name);
        }

        println!();
        println!("Results: {}/{} passed", self.passed(), self.total());

        if self.all_passed() {
            println!("✅ All checks passed!");
        } else {
            println!("❌ {} checks failed", self.total() - self.passed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parity_compare::{compare_values, CompareOptions};
    use serde_json::json;

    #[test]
    fn test_counts() {
        let mut report = RunReport::new();
        assert!(report.all_passed());

        report.record_comparison(compare_values(
            "a",
            &json!({"x": 1}),
            &json!({"x": 1}),
            &CompareOptions::default(),
        ));
        report.record_partition(
            "ledger_data[full node]",
            PartitionReport {
                passed: true,
                ..Default::default()
            },
        );
        assert_eq!(report.total(), 2);
        assert!(report.all_passed());

        let failed = report.record_comparison(compare_values(
            "b",
            &json!({"x": 1}),
            &json!({"x": 2}),
            &CompareOptions::default(),
        ));
        assert!(!failed.passed);
        assert_eq!(report.passed(), 2);
        assert!(!report.all_passed());
    }
}
