//! Unit tests for format.rs

use super::*;
use glam::Vec4;

// ============================================================================
// RAW VALUE TESTS
// ============================================================================

#[test]
fn test_raw_values_match_dxgi() {
    assert_eq!(Format::UNKNOWN.to_raw(), 0);
    assert_eq!(Format::R8G8B8A8_UNORM.to_raw(), 28);
    assert_eq!(Format::D24_UNORM_S8_UINT.to_raw(), 45);
    assert_eq!(Format::B8G8R8A8_UNORM.to_raw(), 87);
}

#[test]
fn test_from_raw_inverts_to_raw() {
    for format in [
        Format::UNKNOWN,
        Format::R32G32B32A32_FLOAT,
        Format::R8G8B8A8_UNORM_SRGB,
        Format::D32_FLOAT,
        Format::R16_UINT,
    ] {
        assert_eq!(Format::from_raw(format.to_raw()), Some(format));
    }
}

#[test]
fn test_from_raw_unknown_value() {
    assert_eq!(Format::from_raw(9999), None);
}

// ============================================================================
// SIZE AND CLASS TESTS
// ============================================================================

#[test]
fn test_bytes_per_element() {
    assert_eq!(Format::UNKNOWN.bytes_per_element(), 1);
    assert_eq!(Format::R16_UINT.bytes_per_element(), 2);
    assert_eq!(Format::R8G8B8A8_UNORM.bytes_per_element(), 4);
    assert_eq!(Format::R32G32B32_FLOAT.bytes_per_element(), 12);
    assert_eq!(Format::R32G32B32A32_FLOAT.bytes_per_element(), 16);
}

#[test]
fn test_copy_compatible_same_size() {
    assert!(Format::R8G8B8A8_UNORM.copy_compatible(Format::B8G8R8A8_UNORM));
    assert!(Format::R32_FLOAT.copy_compatible(Format::R32_UINT));
}

#[test]
fn test_copy_incompatible_size_or_depth() {
    assert!(!Format::R8G8B8A8_UNORM.copy_compatible(Format::R16_UINT));
    assert!(!Format::R32_FLOAT.copy_compatible(Format::D32_FLOAT));
}

// ============================================================================
// CLEAR COLOR PACKING TESTS
// ============================================================================

#[test]
fn test_pack_color_rgba8() {
    let packed = Format::R8G8B8A8_UNORM.pack_color(Vec4::new(1.0, 0.0, 0.5, 1.0)).unwrap();
    assert_eq!(packed, vec![255, 0, 128, 255]);
}

#[test]
fn test_pack_color_bgra8_swizzles() {
    let packed = Format::B8G8R8A8_UNORM.pack_color(Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
    assert_eq!(packed, vec![0, 0, 255, 255]);
}

#[test]
fn test_pack_color_clamps() {
    let packed = Format::R8_UNORM.pack_color(Vec4::new(2.0, 0.0, 0.0, 0.0)).unwrap();
    assert_eq!(packed, vec![255]);
}

#[test]
fn test_pack_color_float4() {
    let packed = Format::R32G32B32A32_FLOAT.pack_color(Vec4::new(1.0, 2.0, 3.0, 4.0)).unwrap();
    assert_eq!(packed.len(), 16);
    assert_eq!(&packed[0..4], &1.0f32.to_le_bytes());
    assert_eq!(&packed[12..16], &4.0f32.to_le_bytes());
}

#[test]
fn test_pack_color_depth_format_is_none() {
    assert!(Format::D32_FLOAT.pack_color(Vec4::ONE).is_none());
}
