// Tray module
// StatusNotifier icon; talks to the event loop through a calloop channel

use ksni::menu::StandardItem;
use ksni::{MenuItem, ToolTip, Tray, TrayService};
use log::debug;
use smithay_client_toolkit::reexports::calloop::channel::Sender;

/// Commands the tray can send into the UI event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    /// Icon activation: hide if visible, restore if hidden
    ToggleVisible,
    /// "Show Window" menu entry
    ShowWindow,
    /// "Exit" menu entry
    Quit,
}

pub struct OverlayTray {
    sender: Sender<TrayCommand>,
}

impl OverlayTray {
    fn send(&self, command: TrayCommand) {
        debug!("Tray command: {:?}", command);
        let _ = self.sender.send(command);
    }
}

impl Tray for OverlayTray {
    fn id(&self) -> String {
        "gifpin".into()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::ApplicationStatus
    }

    fn title(&self) -> String {
        "GIF Overlay".into()
    }

    fn status(&self) -> ksni::Status {
        ksni::Status::Active
    }

    fn icon_name(&self) -> String {
        "image-x-generic".into()
    }

    fn tool_tip(&self) -> ToolTip {
        ToolTip {
            title: "GIF Overlay".into(),
            description: "Click to toggle the overlay".into(),
            icon_name: "image-x-generic".into(),
            icon_pixmap: Vec::new(),
        }
    }

    fn activate(&mut self, _x: i32, _y: i32) {
        self.send(TrayCommand::ToggleVisible);
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![
            StandardItem {
                label: "Show Window".into(),
                activate: Box::new(|this: &mut Self| this.send(TrayCommand::ShowWindow)),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            StandardItem {
                label: "Exit".into(),
                activate: Box::new(|this: &mut Self| this.send(TrayCommand::Quit)),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// Start the tray service on its own thread. The service owns no overlay
/// state; everything flows back through the channel.
pub fn spawn(sender: Sender<TrayCommand>) {
    TrayService::new(OverlayTray { sender }).spawn();
}
