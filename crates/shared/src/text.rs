//! 文本清洗

/// 是否为装饰性字符（表情、国旗、杂项符号、变体选择符、零宽连接符）
fn is_decorative(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F9FF
            | 0x1F1E6..=0x1F1FF
            | 0x2600..=0x26FF
            | 0x2700..=0x27BF
            | 0xFE0F
            | 0x200D
    )
}

/// 去除表情符号并裁剪首尾空白
///
/// 国家名和分类在上游常带有国旗或装饰表情，如 `"Brasil 🇧🇷"`。
pub fn strip_emojis(input: &str) -> String {
    let cleaned: String = input.chars().filter(|c| !is_decorative(*c)).collect();
    cleaned.trim().to_string()
}
