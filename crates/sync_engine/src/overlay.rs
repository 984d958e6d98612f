//! 帧上的诊断文字 (5x7 点阵)
//!
//! 只支持数字、小数点、负号与 's'，足够显示 "12.3s"。

use contracts::FrameSample;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const MARGIN: i32 = 2;

/// 每行 5 位，最高位 (0x10) 为最左列
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        _ => return None,
    };
    Some(rows)
}

/// 在左上角烧录文字 (白字黑底)，返回是否有像素被修改
pub fn burn_text(frame: &mut FrameSample, text: &str) -> bool {
    if frame.is_empty() {
        return false;
    }
    let scale = (frame.width / 160).max(1);
    let advance = (GLYPH_WIDTH + 1) * scale;
    let box_width = advance * text.chars().count() as i32 + MARGIN;
    let box_height = GLYPH_HEIGHT * scale + 2 * MARGIN;

    let mut touched = false;
    // 背景框
    for y in 0..box_height {
        for x in 0..box_width {
            if let Some(i) = frame.index_of(x, y) {
                frame.pixels[i] = 0;
                touched = true;
            }
        }
    }

    for (n, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let origin_x = MARGIN + n as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = origin_x + col * scale + dx;
                        let y = MARGIN + row as i32 * scale + dy;
                        if let Some(i) = frame.index_of(x, y) {
                            frame.pixels[i] = u16::MAX;
                        }
                    }
                }
            }
        }
    }
    touched
}

/// 烧录经过的秒数，例如 "3.2s"
pub fn burn_elapsed_seconds(frame: &mut FrameSample, seconds: f64) -> bool {
    burn_text(frame, &format!("{seconds:.1}s"))
}
