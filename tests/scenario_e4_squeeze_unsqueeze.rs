// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! spec.md §8 E4 / invariant 4: squeeze/unsqueeze round-trip. As
//! DESIGN.md's Open Question resolutions note, spec.md's illustrative
//! digit strings for E4 aren't internally consistent under a single
//! bit-ordering convention, so this test exercises the *positional*
//! definition directly (spec.md §4.1: `dst[j] = src[i]` for the `j`-th
//! `i` with `spec[i]=1`) rather than transcribing the literal strings.

use howdesbt::bitvector::BitVector;

fn vector_from_bits(bits: &[u64]) -> BitVector {
    let len = bits.len() as u64;
    let mut v = BitVector::new_plain_zeroed(len);
    for (i, &b) in bits.iter().enumerate() {
        if b == 1 {
            v.set_bit(i as u64, true).unwrap();
        }
    }
    v
}

#[test]
fn squeeze_keeps_only_spec_selected_positions_in_order() {
    // src    = 1 1 0 1 0 1 1 0
    // spec   = 1 0 1 1 0 1 1 0
    // spec selects positions 0, 2, 3, 5, 6 (five bits); squeezed[j] is
    // src at the j-th selected position: src[0]=1, src[2]=0, src[3]=1,
    // src[5]=1, src[6]=1 -> squeezed = 1 0 1 1 1
    let src = vector_from_bits(&[1, 1, 0, 1, 0, 1, 1, 0]);
    let spec = vector_from_bits(&[1, 0, 1, 1, 0, 1, 1, 0]);

    let squeezed = src.squeeze_by(&spec).unwrap();
    assert_eq!(squeezed.len(), spec.popcount());
    assert_eq!(squeezed.len(), 5);

    let expected = [1u64, 0, 1, 1, 1];
    for (j, &bit) in expected.iter().enumerate() {
        assert_eq!(squeezed.bit(j as u64), bit == 1, "squeezed bit {j}");
    }
}

#[test]
fn unsqueeze_is_squeezes_inverse_on_the_selected_positions() {
    let spec = vector_from_bits(&[1, 0, 1, 1, 0, 1, 1, 0]);
    let src = vector_from_bits(&[1, 1, 0, 1, 0, 1, 1, 0]);

    let squeezed = src.squeeze_by(&spec).unwrap();
    let unsqueezed = squeezed.unsqueeze_by(&spec).unwrap();

    // unsqueeze(squeeze(x, S), S) = x AND S (spec.md §4.1 invariant).
    let masked_src = BitVector::and(&src, &spec).unwrap();
    for p in 0..src.len() {
        assert_eq!(unsqueezed.bit(p), masked_src.bit(p), "position {p}");
    }
}

#[test]
fn squeeze_then_unsqueeze_roundtrips_for_random_specs() {
    // A lightweight property sweep in lieu of a full fuzz grid: cover a
    // handful of spec densities deterministically.
    let specs: [&[u64]; 3] = [
        &[1, 1, 1, 1, 1, 1, 1, 1],
        &[0, 0, 0, 0, 0, 0, 0, 0],
        &[1, 0, 0, 1, 0, 0, 1, 0],
    ];
    let src_bits: [u64; 8] = [1, 0, 1, 1, 0, 1, 0, 1];

    for spec_bits in specs {
        let spec = vector_from_bits(spec_bits);
        let src = vector_from_bits(&src_bits);
        let masked = BitVector::and(&src, &spec).unwrap();

        let squeezed = src.squeeze_by(&spec).unwrap();
        assert_eq!(squeezed.len(), spec.popcount());
        let restored = squeezed.unsqueeze_by(&spec).unwrap();
        for p in 0..src.len() {
            assert_eq!(restored.bit(p), masked.bit(p), "spec {spec_bits:?} position {p}");
        }
    }
}
