use crate::workflow::{MouseButton, Point};
use anyhow::Result;
use std::time::Duration;

/// 鼠标/键盘输入驱动：只负责把动作发送给操作系统，不做任何判断。
///
/// 所有步骤级的等待（点击前后延迟、按住时长）都由调用方通过时钟完成，
/// 唯一例外是 `move_to` 的 `duration`：驱动自行按该时长插值移动轨迹。
pub trait InputDriver {
    fn move_to(&mut self, target: Point, duration: Duration) -> Result<()>;
    fn click(&mut self, button: MouseButton) -> Result<()>;
    fn press_key(&mut self, key: &str) -> Result<()>;
    fn key_down(&mut self, key: &str) -> Result<()>;
    fn key_up(&mut self, key: &str) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;
}

/// 在起点与终点之间生成线性插值轨迹（不含起点，含终点）。
pub fn interpolate(from: Point, to: Point, steps: u32) -> Vec<Point> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            Point::new(
                lerp(from.x, to.x, t),
                lerp(from.y, to.y, t),
            )
        })
        .collect()
}

fn lerp(from: i32, to: i32, t: f64) -> i32 {
    let (from, to) = (from as f64, to as f64);
    (from + (to - from) * t).round() as i32
}

#[cfg(feature = "desktop")]
pub use desktop::EnigoDriver;

#[cfg(feature = "desktop")]
mod desktop {
    use super::{InputDriver, interpolate};
    use crate::workflow::{MouseButton, Point};
    use anyhow::{Result, anyhow};
    use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
    use std::{thread, time::Duration};

    /// 每个插值点之间的间隔。
    const MOVE_TICK: Duration = Duration::from_millis(10);

    /// 基于 `enigo` 的真实输入驱动。
    ///
    /// 若系统未授予辅助功能/输入权限，构造或调用时返回错误。
    pub struct EnigoDriver {
        enigo: Enigo,
    }

    impl EnigoDriver {
        pub fn new() -> Result<Self> {
            let enigo =
                Enigo::new(&Settings::default()).map_err(|e| anyhow!("初始化输入驱动失败: {e}"))?;
            Ok(Self { enigo })
        }
    }

    impl InputDriver for EnigoDriver {
        fn move_to(&mut self, target: Point, duration: Duration) -> Result<()> {
            let steps = (duration.as_millis() / MOVE_TICK.as_millis()) as u32;
            if steps <= 1 {
                return self
                    .enigo
                    .move_mouse(target.x, target.y, Coordinate::Abs)
                    .map_err(|e| anyhow!("移动鼠标失败: {e}"));
            }

            let (x, y) = self
                .enigo
                .location()
                .map_err(|e| anyhow!("读取鼠标位置失败: {e}"))?;
            for p in interpolate(Point::new(x, y), target, steps) {
                self.enigo
                    .move_mouse(p.x, p.y, Coordinate::Abs)
                    .map_err(|e| anyhow!("移动鼠标失败: {e}"))?;
                thread::sleep(MOVE_TICK);
            }
            Ok(())
        }

        fn click(&mut self, button: MouseButton) -> Result<()> {
            let button = match button {
                MouseButton::Left => Button::Left,
                MouseButton::Right => Button::Right,
                MouseButton::Middle => Button::Middle,
            };
            self.enigo
                .button(button, Direction::Click)
                .map_err(|e| anyhow!("点击失败: {e}"))
        }

        fn press_key(&mut self, key: &str) -> Result<()> {
            let k = parse_key(key)?;
            self.enigo
                .key(k, Direction::Click)
                .map_err(|e| anyhow!("按键 {key} 失败: {e}"))
        }

        fn key_down(&mut self, key: &str) -> Result<()> {
            let k = parse_key(key)?;
            self.enigo
                .key(k, Direction::Press)
                .map_err(|e| anyhow!("按下 {key} 失败: {e}"))
        }

        fn key_up(&mut self, key: &str) -> Result<()> {
            let k = parse_key(key)?;
            self.enigo
                .key(k, Direction::Release)
                .map_err(|e| anyhow!("释放 {key} 失败: {e}"))
        }

        fn type_text(&mut self, text: &str) -> Result<()> {
            self.enigo
                .text(text)
                .map_err(|e| anyhow!("输入文本失败: {e}"))
        }
    }

    /// 将按键名解析为 `enigo::Key`。
    fn parse_key(key: &str) -> Result<Key> {
        let lower = key.to_lowercase();
        let k = match lower.as_str() {
            "enter" | "return" => Key::Return,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "escape" | "esc" => Key::Escape,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "up" => Key::UpArrow,
            "down" => Key::DownArrow,
            "left" => Key::LeftArrow,
            "right" => Key::RightArrow,
            "ctrl" | "control" => Key::Control,
            "alt" => Key::Alt,
            "shift" => Key::Shift,
            "meta" | "cmd" | "command" | "win" | "super" => Key::Meta,
            "f1" => Key::F1,
            "f2" => Key::F2,
            "f3" => Key::F3,
            "f4" => Key::F4,
            "f5" => Key::F5,
            "f6" => Key::F6,
            "f7" => Key::F7,
            "f8" => Key::F8,
            "f9" => Key::F9,
            "f10" => Key::F10,
            "f11" => Key::F11,
            "f12" => Key::F12,
            s => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Unicode(c),
                    _ => return Err(anyhow!("无法识别的按键: {key}")),
                }
            }
        };
        Ok(k)
    }

}
