//! The plugin-side message loop.
//!
//! The loop reads framed host messages until EOF. Each `performAction`
//! dispatches into the user plugin through its capability; commands are
//! framed back first, then accumulated diagnostics, then the terminal
//! `actionComplete`. The host drives shutdown by closing the pipe.

use std::io::{BufRead, Write};

use girder_wire::{HostToPluginMessage, PluginAction, PluginToHostMessage};

use crate::capability::PluginHandle;
use crate::context::{HostLink, InputView, PluginContext, TargetView};
use crate::error::{PluginFailure, RuntimeError};

pub(crate) fn run_message_loop<R: BufRead, W: Write>(
    handle: &PluginHandle,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), RuntimeError> {
    loop {
        let message = {
            let mut link = HostLink {
                reader: &mut *reader,
                writer: &mut *writer,
            };
            link.receive()?
        };
        match message {
            None => return Ok(()),
            Some(HostToPluginMessage::PerformAction { input }) => {
                handle_action(handle, input, reader, writer)?;
            }
            Some(HostToPluginMessage::ErrorResponse { error }) => {
                return Err(RuntimeError::Protocol(format!(
                    "error response arrived outside a pending request: {error}"
                )));
            }
        }
    }
}

fn handle_action<R: BufRead, W: Write>(
    handle: &PluginHandle,
    input: girder_wire::PluginInput,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), RuntimeError> {
    let view = InputView::new(input)?;
    let action = view.action().clone();
    let context = PluginContext::new(&view, HostLink { reader, writer });

    let commands = match (&action, handle) {
        (PluginAction::CreateBuildToolCommands { target }, PluginHandle::BuildTool(plugin)) => {
            let target_view = view
                .target(*target)
                .expect("action target validated with the input");
            plugin.create_build_commands(&context, &target_view)?
        }
        (PluginAction::PerformUserCommand { targets, arguments }, PluginHandle::Command(plugin)) => {
            let target_views: Vec<TargetView<'_>> = targets
                .iter()
                .map(|id| view.target(*id).expect("targets validated with the input"))
                .collect();
            plugin.perform_command(&context, &target_views, arguments)?;
            Vec::new()
        }
        _ => {
            return Err(RuntimeError::Plugin(PluginFailure::MalformedInputJson(
                "the requested action does not match the plugin's capability".into(),
            )));
        }
    };

    let (mut link, diagnostics) = context.finish();
    for command in commands {
        link.send(&command.into_message())?;
    }
    for diagnostic in diagnostics {
        link.send(&PluginToHostMessage::EmitDiagnostic { diagnostic })?;
    }
    link.send(&PluginToHostMessage::ActionComplete { success: true })?;
    Ok(())
}
