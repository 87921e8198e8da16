//! Goodness-of-fit tests for the cardinalities of the generated logistic dataset.
//!
//! The benchmark generator assigns stock items to products uniformly at random, so the
//! number of references to a product follows `Binomial(stock items, 1 / products)`.
//! Customers receive a geometrically distributed number of orders.
//!
//! Bins are chosen such that every bin expects at least [`MIN_EXPECTED`] samples;
//! the tails on either side are pooled into a single bin each.

use crate::chi_square::{FrequencyRow, GoodnessOfFit, chi_square, format_table};
use anyhow::{Result, anyhow, bail};
use log::info;
use statrs::distribution::{Binomial, Discrete, DiscreteCDF, Geometric};
use std::collections::BTreeMap;

/// Number of products the benchmark generates.
pub const N_PRODUCTS: u64 = 100_000;

/// Success probability of the geometric orders-per-customer distribution.
pub const ORDER_PROBABILITY: f64 = 0.1;

/// Minimum number of expected samples per bin for the chi-square approximation to hold.
pub const MIN_EXPECTED: f64 = 5.0;

const LOWER_SEARCH_LIMIT: u64 = 2_000;
const UPPER_SEARCH_LIMIT: u64 = 10_000;
const CUSTOMER_SEARCH_LIMIT: u64 = 1_000;

/// Count how often each value occurs.
fn tally(values: &[u64]) -> BTreeMap<u64, u64> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }
    counts
}

/// Sum the tallies for all values within the range.
fn observed_in(counts: &BTreeMap<u64, u64>, range: impl std::ops::RangeBounds<u64>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let total = counts.range(range).map(|(_, c)| *c).sum::<u64>() as f64;
    total
}

/// Find the pooled lower bin `[0, lower]` and the first value of the pooled upper bin.
fn product_bounds(expected: impl Fn(u64) -> f64) -> Result<(u64, u64)> {
    let first_above = (0..LOWER_SEARCH_LIMIT)
        .find(|&k| expected(k) > MIN_EXPECTED)
        .ok_or_else(|| {
            anyhow!(
                "Could not find a lower bound satisfying {MIN_EXPECTED} expected samples per bin"
            )
        })?;
    let lower = first_above.saturating_sub(1);
    let upper = (lower + 1..UPPER_SEARCH_LIMIT)
        .find(|&k| expected(k) < MIN_EXPECTED)
        .ok_or_else(|| {
            anyhow!(
                "Could not find an upper bound satisfying {MIN_EXPECTED} expected samples per bin"
            )
        })?;
    Ok((lower, upper))
}

/// Test the references per product against the expected binomial distribution.
///
/// `product_counts` holds the number of stock items for each product that is referenced at
/// least once. Products that never occur are inferred from [`N_PRODUCTS`].
///
/// # Errors
/// Returns an error if no bins satisfy the minimum expected count or the test cannot be run.
pub fn product_goodness_of_fit(product_counts: &[u64], n_stock_items: u64) -> Result<GoodnessOfFit> {
    #[allow(clippy::cast_precision_loss)]
    let n_products = N_PRODUCTS as f64;
    #[allow(clippy::cast_precision_loss)]
    let binomial = Binomial::new(1.0 / n_products, n_stock_items)
        .map_err(|e| anyhow!("Invalid binomial distribution for {n_stock_items} stock items: {e}"))?;

    let (lower, upper) = product_bounds(|k| binomial.pmf(k) * n_products)?;
    info!("Product bins: lower bound {lower}, upper bound {upper}");

    let mut counts = tally(product_counts);
    let unreferenced = N_PRODUCTS.saturating_sub(product_counts.len() as u64);
    *counts.entry(0).or_insert(0) += unreferenced;

    let mut table = Vec::with_capacity((upper - lower + 1) as usize);
    table.push(FrequencyRow {
        k: lower,
        observed: observed_in(&counts, ..=lower),
        expected: binomial.cdf(lower) * n_products,
    });
    for k in lower + 1..upper {
        table.push(FrequencyRow {
            k,
            observed: observed_in(&counts, k..=k),
            expected: binomial.pmf(k) * n_products,
        });
    }
    table.push(FrequencyRow {
        k: upper,
        observed: observed_in(&counts, upper..),
        expected: binomial.sf(upper - 1) * n_products,
    });

    info!("Product frequencies:\n{}", format_table(&table));
    chi_square(table)
}

/// Test the orders per customer against the expected geometric distribution.
///
/// # Errors
/// Returns an error if a customer has no orders, no upper bound can be found, or the test
/// cannot be run.
pub fn customer_goodness_of_fit(
    orders_per_customer: &[u64],
    n_customers: u64,
) -> Result<GoodnessOfFit> {
    let geometric = Geometric::new(ORDER_PROBABILITY)
        .map_err(|e| anyhow!("Invalid geometric distribution: {e}"))?;
    #[allow(clippy::cast_precision_loss)]
    let n = n_customers as f64;

    let zero_orders = orders_per_customer.iter().filter(|&&o| o == 0).count();
    if zero_orders > 0 {
        bail!("{zero_orders} customers have no orders, which the geometric distribution does not allow");
    }

    let upper = (1..CUSTOMER_SEARCH_LIMIT)
        .find(|&k| geometric.pmf(k) * n < MIN_EXPECTED)
        .ok_or_else(|| {
            anyhow!(
                "Could not find an upper bound satisfying {MIN_EXPECTED} expected samples per bin"
            )
        })?;
    info!("Customer bins: upper bound {upper}");

    let counts = tally(orders_per_customer);
    let mut table: Vec<FrequencyRow> = (1..upper)
        .map(|k| FrequencyRow {
            k,
            observed: observed_in(&counts, k..=k),
            expected: geometric.pmf(k) * n,
        })
        .collect();
    table.push(FrequencyRow {
        k: upper,
        observed: observed_in(&counts, upper..),
        expected: geometric.sf(upper - 1) * n,
    });

    info!("Customer frequencies:\n{}", format_table(&table));
    chi_square(table)
}
