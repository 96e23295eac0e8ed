use crate::config::Appearance;
use crate::layout::Layout;
use crate::status::{Status, SysSensors};
use crate::workspace::WORKSPACE_COUNT;
use crate::xconn::X11;
use chrono::Local;
use std::time::Instant;
use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{
    ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask, Font, Gcontext,
    Rectangle, Screen, StackMode, Window, WindowClass,
};

/// What the window manager tells the bar about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarView {
    pub current: usize,
    pub layout: Layout,
    pub clients: usize,
    pub occupied: [bool; WORKSPACE_COUNT],
}

/// The taskbar as seen from the event loop.
pub trait StatusBar<X> {
    fn window(&self) -> Window;
    fn height(&self) -> u16;
    /// Refresh cached status. Returns true when a redraw is due.
    fn update(&mut self, view: &BarView) -> bool;
    fn draw(&mut self, conn: &X) -> Result<(), ConnectionError>;
    fn destroy(&mut self, conn: &X) -> Result<(), ConnectionError>;

    /// Redraw once the last expose of a series arrives.
    fn handle_expose(&mut self, conn: &X, count: u16) -> Result<(), ConnectionError> {
        if count == 0 {
            self.draw(conn)
        } else {
            Ok(())
        }
    }
}

pub struct Bar {
    window: Window,
    gc: Gcontext,
    font: Font,
    width: u16,
    height: u16,
    char_width: u16,
    status: Status,
    sensors: SysSensors,
}

impl Bar {
    pub fn new<C: Connection>(
        conn: &C,
        screen: &Screen,
        appearance: &Appearance,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let window = conn.generate_id()?;
        let gc = conn.generate_id()?;
        let font = conn.generate_id()?;
        let height = appearance.taskbar_height;
        let width = screen.width_in_pixels;
        let y = screen.height_in_pixels.saturating_sub(height) as i16;

        let win_aux = CreateWindowAux::new()
            .background_pixel(appearance.taskbar_color)
            .override_redirect(1)
            .event_mask(EventMask::EXPOSURE);

        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            0,
            y,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &win_aux,
        )?;

        conn.open_font(font, appearance.font.as_bytes())?;
        let char_width = conn
            .query_font(font)?
            .reply()?
            .max_bounds
            .character_width
            .max(1) as u16;

        let gc_aux = CreateGCAux::new()
            .foreground(appearance.taskbar_font_color)
            .background(appearance.taskbar_color)
            .font(font)
            .graphics_exposures(0);
        conn.create_gc(gc, window, &gc_aux)?;

        conn.map_window(window)?;

        Ok(Self {
            window,
            gc,
            font,
            width,
            height,
            char_width,
            status: Status::default(),
            sensors: SysSensors::default(),
        })
    }
}

impl<C: Connection> StatusBar<X11<C>> for Bar {
    fn window(&self) -> Window {
        self.window
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn update(&mut self, view: &BarView) -> bool {
        self.status
            .refresh(view, Local::now(), Instant::now(), &self.sensors)
    }

    fn draw(&mut self, conn: &X11<C>) -> Result<(), ConnectionError> {
        let conn = conn.inner();
        let stack = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        conn.configure_window(self.window, &stack)?;
        conn.clear_area(false, self.window, 0, 0, self.width, self.height)?;

        let block_size: i16 = 12;
        let gap: i16 = 4;
        let start_x: i16 = 8;
        let start_y = (self.height as i16 - block_size) / 2;

        let mut outlines = Vec::new();
        let mut filled = Vec::new();
        if let Some(view) = &self.status.view {
            for i in 0..WORKSPACE_COUNT {
                let rect = Rectangle {
                    x: start_x + i as i16 * (block_size + gap),
                    y: start_y,
                    width: block_size as u16,
                    height: block_size as u16,
                };
                if i == view.current {
                    filled.push(rect);
                    continue;
                }
                outlines.push(rect);
                if view.occupied[i] {
                    filled.push(Rectangle {
                        x: rect.x + 3,
                        y: rect.y + 3,
                        width: rect.width - 6,
                        height: rect.height - 6,
                    });
                }
            }
        }
        if !outlines.is_empty() {
            conn.poly_rectangle(self.window, self.gc, &outlines)?;
        }
        if !filled.is_empty() {
            conn.poly_fill_rectangle(self.window, self.gc, &filled)?;
        }

        let baseline = self.height as i16 - (self.height as i16 - 10) / 2;
        let left = self.status.left_text();
        let left_x = start_x + WORKSPACE_COUNT as i16 * (block_size + gap) + 8;
        conn.image_text8(self.window, self.gc, left_x, baseline, left.as_bytes())?;

        let right = self.status.right_text();
        let right_w = (right.len() as u16).saturating_mul(self.char_width);
        let right_x = self.width.saturating_sub(right_w + 8) as i16;
        conn.image_text8(self.window, self.gc, right_x, baseline, right.as_bytes())?;
        Ok(())
    }

    fn destroy(&mut self, conn: &X11<C>) -> Result<(), ConnectionError> {
        let conn = conn.inner();
        conn.free_gc(self.gc)?;
        conn.close_font(self.font)?;
        conn.destroy_window(self.window)?;
        Ok(())
    }
}
