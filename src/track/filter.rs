//! Fixed filter stages for marker extraction.
//!
//! Each stage matches one step of the acquisition rig's chain: Gaussian
//! blur, channel split, threshold-to-zero, brightness gating, dilation, and
//! mutual suppression. Stages preserve plane dimensions; none of them keeps
//! state between frames.

use anyhow::{anyhow, Result};

use crate::frame::{Frame, Plane};

/// Rec.601 luma weights, matching the capture chain's gray conversion.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Gaussian blur over an RGB frame.
///
/// `ksize` is the square kernel side (must be odd); sigma is derived from
/// the kernel size the same way the rig's vision library derives it:
/// `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`, which is 2.0 for the default 11.
pub fn gaussian_blur(frame: &Frame, ksize: u32) -> Result<Frame> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(anyhow!("blur kernel size must be odd, got {}", ksize));
    }
    let kernel = gaussian_kernel(ksize);
    let radius = (ksize / 2) as i64;
    let w = frame.width() as usize;
    let h = frame.height() as usize;
    let src = frame.data();

    // Separable blur: horizontal pass into f32, vertical pass back to u8.
    let mut tmp = vec![0f32; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0f32;
                for (k, &weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as i64 + k as i64 - radius, w as i64);
                    acc += weight * src[(y * w + sx) * 3 + c] as f32;
                }
                tmp[(y * w + x) * 3 + c] = acc;
            }
        }
    }

    let mut out = vec![0u8; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0f32;
                for (k, &weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as i64 + k as i64 - radius, h as i64);
                    acc += weight * tmp[(sy * w + x) * 3 + c];
                }
                out[(y * w + x) * 3 + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Frame::new(out, frame.width(), frame.height())
}

/// Split a frame into its red, green, and blue channel planes.
pub fn split_rgb(frame: &Frame) -> (Plane, Plane, Plane) {
    let w = frame.width();
    let h = frame.height();
    let mut red = Plane::zeros(w, h);
    let mut green = Plane::zeros(w, h);
    let mut blue = Plane::zeros(w, h);
    for (i, chunk) in frame.data().chunks_exact(3).enumerate() {
        red.data_mut()[i] = chunk[0];
        green.data_mut()[i] = chunk[1];
        blue.data_mut()[i] = chunk[2];
    }
    (red, green, blue)
}

/// Rec.601 luma plane of a frame.
pub fn luma(frame: &Frame) -> Plane {
    let mut out = Plane::zeros(frame.width(), frame.height());
    for (i, chunk) in frame.data().chunks_exact(3).enumerate() {
        let y = LUMA_R * chunk[0] as f32 + LUMA_G * chunk[1] as f32 + LUMA_B * chunk[2] as f32;
        out.data_mut()[i] = y.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Threshold-to-zero: values at or below `thresh` become 0, others keep
/// their value.
pub fn threshold_to_zero(plane: &mut Plane, thresh: u8) {
    for v in plane.data_mut() {
        if *v <= thresh {
            *v = 0;
        }
    }
}

/// Zero `plane` wherever `gate` is zero.
pub fn apply_gate(plane: &mut Plane, gate: &Plane) -> Result<()> {
    if !plane.same_dims(gate) {
        return Err(anyhow!(
            "gate dimensions {}x{} do not match plane {}x{}",
            gate.width(),
            gate.height(),
            plane.width(),
            plane.height()
        ));
    }
    for (v, &g) in plane.data_mut().iter_mut().zip(gate.data()) {
        if g == 0 {
            *v = 0;
        }
    }
    Ok(())
}

/// Dilate with a 3x3 structuring element, `iterations` times.
///
/// Out-of-bounds neighbors do not contribute to the maximum.
pub fn dilate(plane: &Plane, iterations: u32) -> Plane {
    let w = plane.width() as i64;
    let h = plane.height() as i64;
    let mut current = plane.clone();
    for _ in 0..iterations {
        let src = current.data().to_vec();
        let dst = current.data_mut();
        for y in 0..h {
            for x in 0..w {
                let mut max = 0u8;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let nx = x + dx;
                        let ny = y + dy;
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let v = src[(ny * w + nx) as usize];
                        if v > max {
                            max = v;
                        }
                    }
                }
                dst[(y * w + x) as usize] = max;
            }
        }
    }
    current
}

/// Mutual suppression between the two marker masks, in rig order: zero red
/// where green exceeds red, then zero green where red exceeds green.
pub fn suppress_weaker(red: &mut Plane, green: &mut Plane) -> Result<()> {
    if !red.same_dims(green) {
        return Err(anyhow!(
            "mask dimensions differ: red {}x{}, green {}x{}",
            red.width(),
            red.height(),
            green.width(),
            green.height()
        ));
    }
    for (r, g) in red.data_mut().iter_mut().zip(green.data()) {
        if *g > *r {
            *r = 0;
        }
    }
    for (g, r) in green.data_mut().iter_mut().zip(red.data()) {
        if *r > *g {
            *g = 0;
        }
    }
    Ok(())
}

fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (ksize / 2) as i64;
    let mut kernel = Vec::with_capacity(ksize as usize);
    for i in -radius..=radius {
        let x = i as f32;
        kernel.push((-x * x / (2.0 * sigma * sigma)).exp());
    }
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

fn reflect_101(index: i64, len: i64) -> usize {
    // Mirror without repeating the edge sample: -1 -> 1, len -> len - 2.
    let mut i = index;
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    i = i.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frame(value: u8, width: u32, height: u32) -> Frame {
        let data = vec![value; (width as usize) * (height as usize) * 3];
        Frame::new(data, width, height).unwrap()
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(11);
        assert_eq!(kernel.len(), 11);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..5 {
            assert!((kernel[i] - kernel[10 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn blur_preserves_uniform_frames() -> Result<()> {
        let frame = uniform_frame(120, 16, 12);
        let blurred = gaussian_blur(&frame, 11)?;
        assert_eq!(blurred.width(), 16);
        assert_eq!(blurred.height(), 12);
        assert!(blurred.data().iter().all(|&v| v == 120));
        Ok(())
    }

    #[test]
    fn blur_rejects_even_kernels() {
        let frame = uniform_frame(0, 4, 4);
        assert!(gaussian_blur(&frame, 10).is_err());
        assert!(gaussian_blur(&frame, 0).is_err());
    }

    #[test]
    fn blur_spreads_an_impulse() -> Result<()> {
        let mut frame = Frame::black(15, 15);
        frame.set_rgb(7, 7, [255, 0, 0]);
        let blurred = gaussian_blur(&frame, 11)?;
        // Center keeps the largest share, neighbors get some of it.
        assert!(blurred.rgb(7, 7)[0] > blurred.rgb(6, 7)[0]);
        assert!(blurred.rgb(6, 7)[0] > 0);
        assert_eq!(blurred.rgb(7, 7)[1], 0);
        Ok(())
    }

    #[test]
    fn split_separates_channels() {
        let mut frame = Frame::black(2, 2);
        frame.set_rgb(0, 0, [10, 20, 30]);
        let (r, g, b) = split_rgb(&frame);
        assert_eq!(r.get(0, 0), 10);
        assert_eq!(g.get(0, 0), 20);
        assert_eq!(b.get(0, 0), 30);
        assert_eq!(r.get(1, 1), 0);
    }

    #[test]
    fn luma_uses_rec601_weights() {
        let mut frame = Frame::black(1, 1);
        frame.set_rgb(0, 0, [100, 100, 100]);
        assert_eq!(luma(&frame).get(0, 0), 100);

        let mut red_only = Frame::black(1, 1);
        red_only.set_rgb(0, 0, [200, 0, 0]);
        // 0.299 * 200 = 59.8 -> 60
        assert_eq!(luma(&red_only).get(0, 0), 60);
    }

    #[test]
    fn threshold_zeroes_at_and_below() {
        let mut plane = Plane::new(vec![0, 99, 100, 101, 255], 5, 1).unwrap();
        threshold_to_zero(&mut plane, 100);
        assert_eq!(plane.data(), &[0, 0, 0, 101, 255]);
    }

    #[test]
    fn gate_zeroes_dark_regions() -> Result<()> {
        let mut plane = Plane::new(vec![50, 60, 70, 80], 2, 2).unwrap();
        let gate = Plane::new(vec![0, 1, 0, 1], 2, 2).unwrap();
        apply_gate(&mut plane, &gate)?;
        assert_eq!(plane.data(), &[0, 60, 0, 80]);
        Ok(())
    }

    #[test]
    fn gate_rejects_dimension_mismatch() {
        let mut plane = Plane::zeros(2, 2);
        let gate = Plane::zeros(3, 2);
        assert!(apply_gate(&mut plane, &gate).is_err());
    }

    #[test]
    fn dilate_grows_a_point() {
        let mut plane = Plane::zeros(7, 7);
        plane.set(3, 3, 200);

        let once = dilate(&plane, 1);
        // 3x3 block around the seed.
        for y in 2..=4 {
            for x in 2..=4 {
                assert_eq!(once.get(x, y), 200);
            }
        }
        assert_eq!(once.get(1, 3), 0);

        let thrice = dilate(&plane, 3);
        // 7x7 block: the seed reaches the border after three iterations.
        for y in 0..7 {
            for x in 0..7 {
                assert_eq!(thrice.get(x, y), 200);
            }
        }
    }

    #[test]
    fn suppression_keeps_the_stronger_mask() -> Result<()> {
        let mut red = Plane::new(vec![100, 50, 80, 0], 2, 2).unwrap();
        let mut green = Plane::new(vec![40, 90, 80, 0], 2, 2).unwrap();
        suppress_weaker(&mut red, &mut green)?;
        // red wins the first pixel, green the second, ties keep both.
        assert_eq!(red.data(), &[100, 0, 80, 0]);
        assert_eq!(green.data(), &[0, 90, 80, 0]);
        Ok(())
    }
}
