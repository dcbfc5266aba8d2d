//! Twiddled (Morton order) addressing.
//!
//! A twiddled texture stores texels in Z-order: bit `k` of the x and y
//! coordinates land at bits `2k + 1` and `2k` of the memory address.

/// Spread the bits of `i` so bit `k` moves to bit `2k`.
#[inline]
pub fn twiddle(i: u32) -> u32 {
    let mut out = 0;
    let mut bit = 0;
    let mut rest = i;
    while rest != 0 {
        out |= (rest & 1) << (2 * bit);
        rest >>= 1;
        bit += 1;
    }
    out
}

/// `twiddle(i)` for every `i` in `0..n`.
pub fn twiddle_table(n: usize) -> Vec<u32> {
    (0..n as u32).map(twiddle).collect()
}

/// Memory address of `(x, y)` inside one twiddled square.
#[inline]
pub fn twiddled_address(table: &[u32], x: usize, y: usize) -> usize {
    ((table[x] << 1) | table[y]) as usize
}

/// Reorder linearly read texels from twiddled to row-major order.
///
/// Non-square images are stored as consecutive twiddled squares of side
/// `min(width, height)`, visited row-major.
pub fn untwiddle<T: Copy + Default>(source: &[T], width: usize, height: usize) -> Vec<T> {
    let side = width.min(height);
    let table = twiddle_table(side);
    let mut out = vec![T::default(); width * height];
    if side == 0 {
        return out;
    }

    let mut square_base = 0;
    for square_y in (0..height).step_by(side) {
        for square_x in (0..width).step_by(side) {
            let base = square_y * width + square_x;
            for y in 0..side {
                for x in 0..side {
                    let src = square_base + twiddled_address(&table, x, y);
                    if let (Some(texel), Some(slot)) = (source.get(src), out.get_mut(base + y * width + x)) {
                        *slot = *texel;
                    }
                }
            }
            square_base += side * side;
        }
    }
    out
}
