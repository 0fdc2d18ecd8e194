// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A from-scratch implementation of a Sequence Bloom Tree: a
//! hierarchy of Bloom filters over a collection of sequence samples
//! that lets a batch of k-mer queries be answered against every
//! sample without re-scanning each one individually.
//!
//! ##### About
//!
//! A tree's leaves each hold one sample's Bloom filter; internal nodes
//! hold a filter summarizing their subtree, built bottom-up in one of
//! four kinds (`Simple` union, `AllSome`, `Determined`,
//! `DeterminedBrief`) that trade construction cost against how much a
//! query can prune before reaching a leaf. A batched query walks the
//! tree once for a whole set of sequences, partitioning each query's
//! hash positions into resolved/unresolved as it descends so that a
//! position already proven present or absent higher up is never
//! re-examined.
//!
//! This crate does not parse FASTA/FASTQ; callers supply raw sequence
//! bytes and this crate turns them into s-mers, hash positions, Bloom
//! filters, and tree structure.
//!
//! # Example usage
//!
//! ```
//! use howdesbt::{build, cluster, config::Config, query, tree::Tree};
//! # use howdesbt::bloom::{BloomFilter, HashParams, SimpleFilter};
//! # use howdesbt::bitvector::BitVector;
//! # use howdesbt::tree::io::{save_filter, SavedFilter};
//! #
//! # let dir = tempfile::tempdir()?;
//! # let params = HashParams { smer_size: 4, num_hashes: 1, seed1: 1, seed2: 2,
//! #     hash_modulus: 16, num_bits: 16, set_size_known: false, set_size: 0 };
//! # let mut a = BitVector::new_plain_zeroed(16);
//! # a.set_bit(0, true)?;
//! # let leaf_a = BloomFilter::Simple(SimpleFilter { params, b: a });
//! # save_filter(&dir.path().join("sample.bf"), SavedFilter::Filter(&leaf_a), &Config::default())?;
//! #
//! // Cluster a set of leaf filters into a tree topology, then build it.
//! let leaves = vec![("sample".to_string(), dir.path().join("sample.bf"))];
//! let mut tree = cluster::cluster(&leaves, &Config::default(), dir.path(), "node{number}.bf")?;
//! build::build(&mut tree, build::BuildKind::DeterminedBrief, &Config::default())?;
//!
//! // Query it with a batch of sequences.
//! let mut queries = vec![
//!     query::Query::prepare("q1".to_string(), b"ACGTACGT", 0.9, &params, &Config::default()).unwrap(),
//! ];
//! query::run_batch(&mut tree, &mut queries, &Config::default())?;
//! for q in &queries {
//!     for m in &q.matches {
//!         println!("{} matched {}", q.name, m.leaf_name);
//!     }
//! }
//! # Ok::<(), howdesbt::Error>(())
//! ```

pub mod bitvector;
pub mod bloom;
pub mod build;
pub mod cluster;
pub mod coding;
pub mod config;
pub mod container;
pub mod error;
pub mod fs;
pub mod hash;
pub mod path;
pub mod query;
pub mod tree;

pub use config::Config;
pub use error::{Error, Result};
pub use tree::Tree;
