use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use crate::math::Vec3;
use crate::mission::worldrep::{Cell, Lightmap, LightmapFormat};
use crate::processing::sampler::{CellLighting, PolyLayers};

/// HDR lightmaps are stored at half scale so the run-time can overbright 2x
const HDR_SCALE: f32 = 0.5;

fn quantize(c: f32, scale: f32) -> u8 {
    (c * scale).clamp(0.0, 255.0).round() as u8
}

/// Appends one layer of float texels in the given encoding
pub fn encode_layer(out: &mut Vec<u8>, texels: &[Vec3], format: LightmapFormat, scale: f32) -> Result<()> {
    for t in texels {
        let [r, g, b] = t.map(|c| quantize(c, scale));
        match format {
            LightmapFormat::Mono8 => {
                let mean = (r as f32 + g as f32 + b as f32) / 3.0;
                out.write_u8(mean.round() as u8)?;
            }
            LightmapFormat::Rgb555 => {
                // Top 5 bits per channel: red low, blue high
                let packed = (r as u16 >> 3) | ((g as u16 >> 3) << 5) | ((b as u16 >> 3) << 10);
                out.write_u16::<LittleEndian>(packed)?;
            }
            LightmapFormat::Rgba8888 => {
                out.write_all(&[r, g, b, 255])?;
            }
        }
    }
    Ok(())
}

/// Replaces the lightmap's pixels and animated-layer mask
pub fn write_lightmap(lightmap: &mut Lightmap, layers: &PolyLayers, format: LightmapFormat, hdr: bool) -> Result<()> {
    let texels = lightmap.texel_count();
    if layers.base.len() != texels {
        anyhow::bail!("Texel count mismatch. Expected {}, got {}", texels, layers.base.len());
    }

    let scale = if hdr && !layers.full_bright { HDR_SCALE } else { 1.0 };
    let mut data = Vec::with_capacity(texels * format.bytes_per_texel() * (1 + layers.anim.len()));
    let mut flags = 0u32;

    encode_layer(&mut data, &layers.base, format, scale)?;
    for (slot, anim) in &layers.anim {
        if anim.len() != texels {
            anyhow::bail!("Animated layer {} has {} texels, expected {}", slot, anim.len(), texels);
        }
        flags |= 1 << slot;
        encode_layer(&mut data, anim, format, scale)?;
    }

    lightmap.data = data;
    lightmap.anim_flags = flags;
    Ok(())
}

/// Stores a cell's lighting: every lightmap and the animated-light palette
pub fn write_cell(cell_idx: usize, cell: &mut Cell, lighting: &CellLighting, format: LightmapFormat, hdr: bool) -> Result<()> {
    for (i, (lightmap, layers)) in cell.lightmaps.iter_mut().zip(&lighting.polys).enumerate() {
        write_lightmap(lightmap, layers, format, hdr)
            .with_context(|| format!("Failed to encode lightmap {} of cell {}", i, cell_idx))?;
    }
    cell.anim_palette = lighting.palette.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lightmap(width: usize, height: usize) -> Lightmap {
        Lightmap { width, height, u_base: 0.0, v_base: 0.0, anim_flags: 0, data: Vec::new() }
    }

    fn encode(texels: &[Vec3], format: LightmapFormat, scale: f32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_layer(&mut out, texels, format, scale).expect("in-memory write");
        out
    }

    #[test]
    fn test_rgb555_bit_layout() {
        let bytes = encode(&[[255.0, 0.0, 0.0], [0.0, 255.0, 0.0], [0.0, 0.0, 255.0]], LightmapFormat::Rgb555, 1.0);
        assert_eq!(bytes, vec![0x1F, 0x00, 0xE0, 0x03, 0x00, 0x7C]);

        // 8 -> 1 in each channel
        let bytes = encode(&[[8.0, 8.0, 8.0]], LightmapFormat::Rgb555, 1.0);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 1 | (1 << 5) | (1 << 10));
    }

    #[test]
    fn test_mono_and_rgba() {
        assert_eq!(encode(&[[30.0, 60.0, 90.0]], LightmapFormat::Mono8, 1.0), vec![60]);
        assert_eq!(encode(&[[30.0, 60.0, 90.0]], LightmapFormat::Rgba8888, 1.0), vec![30, 60, 90, 255]);
    }

    #[test]
    fn test_clamp_and_hdr_scale() {
        assert_eq!(encode(&[[-20.0, 300.0, 128.4]], LightmapFormat::Rgba8888, 1.0), vec![0, 255, 128, 255]);
        assert_eq!(encode(&[[200.0, 600.0, 0.0]], LightmapFormat::Rgba8888, HDR_SCALE), vec![100, 255, 0, 255]);
    }

    #[test]
    fn test_layers_follow_slot_bits() {
        let mut lm = lightmap(2, 1);
        let layers = PolyLayers {
            base: vec![[1.0; 3]; 2],
            anim: vec![(0, vec![[2.0; 3]; 2]), (3, vec![[4.0; 3]; 2])],
            full_bright: false,
        };
        write_lightmap(&mut lm, &layers, LightmapFormat::Mono8, false).expect("sizes match");

        assert_eq!(lm.anim_flags, 0b1001);
        assert_eq!(lm.layer_count(), 3);
        assert_eq!(lm.data, vec![1, 1, 2, 2, 4, 4]);
        assert_eq!(lm.layer(2, LightmapFormat::Mono8), Some(&[4u8, 4][..]));
    }

    #[test]
    fn test_full_bright_ignores_hdr() {
        let mut lm = lightmap(1, 1);
        let layers = PolyLayers { base: vec![[255.0; 3]], anim: Vec::new(), full_bright: true };
        write_lightmap(&mut lm, &layers, LightmapFormat::Rgba8888, true).expect("sizes match");
        assert_eq!(lm.data, vec![255, 255, 255, 255]);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let mut lm = lightmap(2, 2);
        let layers = PolyLayers { base: vec![[0.0; 3]; 3], ..Default::default() };
        assert!(write_lightmap(&mut lm, &layers, LightmapFormat::Rgb555, false).is_err());
    }
}
