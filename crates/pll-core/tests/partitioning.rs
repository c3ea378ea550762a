//! Balanced Partitioning Tests
//!
//! Validates the layout produced when resident data is loaded into a leaf PLL:
//! - lengths sum to the collection size and differ by at most one
//! - larger partitions come first
//! - concatenating partitions in order reproduces the input
//! - invalid partition counts are rejected
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package pll-core --test partitioning
//! ```

use std::sync::Arc;

use pretty_assertions::assert_eq;

use pll_core::{create_partitions, ContextConfig, Partition, Pll, PllContext, PllError, PllNode};

// ============================================================================
// Test Helpers
// ============================================================================

fn context() -> Arc<PllContext> {
    PllContext::new(ContextConfig::default().with_workers(2)).expect("Failed to create context")
}

/// Sizes and partition counts covering empty, exact, uneven and sparse splits
fn grid() -> impl Iterator<Item = (usize, i64)> {
    let sizes = [0usize, 1, 2, 3, 7, 10, 16, 31, 100];
    let counts = [1i64, 2, 3, 4, 7, 8, 13];
    sizes
        .into_iter()
        .flat_map(move |n| counts.into_iter().map(move |k| (n, k)))
}

// ============================================================================
// Layout Properties
// ============================================================================

#[test]
fn test_lengths_sum_to_size() {
    for (n, k) in grid() {
        let partitions = create_partitions(n, k).expect("Failed to partition");
        assert_eq!(partitions.len(), k as usize, "n={n} k={k}");
        let total: usize = partitions.iter().map(|p| p.length()).sum();
        assert_eq!(total, n, "n={n} k={k}");
    }
}

#[test]
fn test_lengths_are_balanced_larger_first() {
    for (n, k) in grid() {
        let partitions = create_partitions(n, k).expect("Failed to partition");
        let base = n / k as usize;
        let extra = n % k as usize;

        for (i, p) in partitions.iter().enumerate() {
            let expected = if i < extra { base + 1 } else { base };
            assert_eq!(p.length(), expected, "n={n} k={k} partition {i}");
        }
    }
}

#[test]
fn test_partitions_are_contiguous() {
    for (n, k) in grid() {
        let partitions = create_partitions(n, k).expect("Failed to partition");
        let mut offset = 0;
        for (i, p) in partitions.iter().enumerate() {
            assert_eq!(p.index(), i);
            assert_eq!(p.offset(), offset, "n={n} k={k} partition {i}");
            offset = p.end();
        }
        assert_eq!(offset, n);
    }
}

#[test]
fn test_invalid_counts() {
    assert!(create_partitions(0, 0).expect("empty list").is_empty());

    for (n, k) in [(1, 0), (10, 0), (0, -1), (5, -2)] {
        let err = create_partitions(n, k).unwrap_err();
        assert!(
            matches!(err, PllError::InvalidArgument(_)),
            "n={n} k={k}: {err}"
        );
    }
}

// ============================================================================
// Leaf PLL Content
// ============================================================================

#[test]
fn test_concatenation_reproduces_input() {
    let ctx = context();
    for (n, k) in grid() {
        let input: Vec<usize> = (0..n).collect();
        let pll = ctx
            .parallelize_with(input.clone(), k)
            .expect("Failed to load elements");

        let mut rebuilt = Vec::with_capacity(n);
        for partition in pll.partitions() {
            rebuilt.extend(pll.compute(partition.as_ref()).expect("compute"));
        }
        assert_eq!(rebuilt, input, "n={n} k={k}");
        assert_eq!(pll.collect().expect("collect"), input);
        assert_eq!(pll.count().expect("count"), n as u64);
    }
}

#[test]
fn test_sizes_match_layout() {
    let ctx = context();
    let pll = ctx
        .parallelize_with((0..10).map(|i| format!("row-{i}")), 3)
        .expect("Failed to load elements");

    assert_eq!(pll.compute_partition_sizes().expect("sizes"), vec![4, 3, 3]);
    assert_eq!(
        pll.take(5).expect("take"),
        vec!["row-0", "row-1", "row-2", "row-3", "row-4"]
    );
}

#[test]
fn test_default_partition_count() {
    let ctx = PllContext::new(
        ContextConfig::default()
            .with_workers(2)
            .with_default_partitions(5),
    )
    .expect("Failed to create context");

    let pll = ctx.parallelize(0..12).expect("Failed to load elements");
    assert_eq!(pll.num_partitions(), 5);
    assert_eq!(pll.compute_partition_sizes().expect("sizes"), vec![3, 3, 2, 2, 2]);
}

#[test]
fn test_empty_collection() {
    let ctx = context();
    let empty = ctx
        .parallelize_with(Vec::<u8>::new(), 0)
        .expect("empty list with no partitions");
    assert_eq!(empty.num_partitions(), 0);
    assert!(empty.collect().expect("collect").is_empty());

    let sparse = ctx
        .parallelize_with(Vec::<u8>::new(), 3)
        .expect("empty list with partitions");
    assert_eq!(sparse.compute_partition_sizes().expect("sizes"), vec![0, 0, 0]);
}
