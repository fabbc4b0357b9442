//! Per-control hidden / readonly / disabled flags
//!
//! A form host keeps three selectors, one per attribute, and asks the scope
//! for each control it renders. Busy or failed bindings disable every
//! control regardless of the `disabledcontrols` attribute.

use crate::error::Result;
use crate::selector::ControlSelector;
use crate::state::BindingState;

/// Effective flags for one control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub hidden: bool,
    pub readonly: bool,
    pub disabled: bool,
}

impl ControlFlags {
    /// Can the user change the control's value
    pub fn is_editable(&self) -> bool {
        !self.hidden && !self.readonly && !self.disabled
    }
}

/// The three selectors of one form host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlScope {
    pub hidden: ControlSelector,
    pub readonly: ControlSelector,
    pub disabled: ControlSelector,
}

impl ControlScope {
    /// Compile the three attribute values (`None` means the attribute is absent)
    pub fn from_attributes(
        hidden: Option<&str>,
        readonly: Option<&str>,
        disabled: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            hidden: ControlSelector::compile(hidden.unwrap_or_default())?,
            readonly: ControlSelector::compile(readonly.unwrap_or_default())?,
            disabled: ControlSelector::compile(disabled.unwrap_or_default())?,
        })
    }

    /// Scope adjusted for the binding state: anything but idle disables all
    pub fn for_state(&self, state: &BindingState) -> Self {
        if state.is_idle() {
            return self.clone();
        }
        Self {
            hidden: self.hidden.clone(),
            readonly: self.readonly.clone(),
            disabled: ControlSelector::all(),
        }
    }

    pub fn is_hidden(&self, path: &str) -> bool {
        self.hidden.matches(path, false)
    }

    pub fn is_readonly(&self, path: &str) -> bool {
        self.readonly.matches(path, false)
    }

    pub fn is_disabled(&self, path: &str) -> bool {
        self.disabled.matches(path, false)
    }

    pub fn flags(&self, path: &str) -> ControlFlags {
        ControlFlags {
            hidden: self.is_hidden(path),
            readonly: self.is_readonly(path),
            disabled: self.is_disabled(path),
        }
    }

    /// Scope for a nested form rendered at `path`
    pub fn zoom(&self, path: &str) -> Self {
        Self {
            hidden: self.hidden.zoom(path),
            readonly: self.readonly.zoom(path),
            disabled: self.disabled.zoom(path),
        }
    }
}
