/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! State pseudo-classes and the element state bits they depend on.

use crate::Atom;

#[macro_export]
macro_rules! state_pseudo_classes {
    ($macro_name: ident) => { $macro_name! {
        #[doc = "The mouse is down on this element. \
                 https://html.spec.whatwg.org/multipage/#selector-active"]
        state "active" => Active / IN_ACTIVE_STATE = 1 << 0,
        #[doc = "This element has focus. \
                 https://html.spec.whatwg.org/multipage/#selector-focus"]
        state "focus" => Focus / IN_FOCUS_STATE = 1 << 1,
        #[doc = "The mouse is hovering over this element. \
                 https://html.spec.whatwg.org/multipage/#selector-hover"]
        state "hover" => Hover / IN_HOVER_STATE = 1 << 2,
        #[doc = "Content is enabled (and can be disabled). \
                 https://html.spec.whatwg.org/multipage/#selector-enabled"]
        state "enabled" => Enabled / IN_ENABLED_STATE = 1 << 3,
        #[doc = "Content is disabled. \
                 https://html.spec.whatwg.org/multipage/#selector-disabled"]
        state "disabled" => Disabled / IN_DISABLED_STATE = 1 << 4,
        #[doc = "Content is checked. \
                 https://html.spec.whatwg.org/multipage/#selector-checked"]
        state "checked" => Checked / IN_CHECKED_STATE = 1 << 5,
        #[doc = "https://html.spec.whatwg.org/multipage/#selector-indeterminate"]
        state "indeterminate" => Indeterminate / IN_INDETERMINATE_STATE = 1 << 6,
        #[doc = "An unvisited link."]
        state "link" => Link / IN_UNVISITED_STATE = 1 << 7,
        #[doc = "A visited link."]
        state "visited" => Visited / IN_VISITED_STATE = 1 << 8,
        #[doc = "Any link, visited or not."]
        state "any-link" => AnyLink / IN_ANY_LINK_STATE = (1 << 7) | (1 << 8),
        #[doc = "The target of the document URL's fragment."]
        state "target" => Target / IN_TARGET_STATE = 1 << 9,
        state "default" => Default / IN_DEFAULT_STATE = 1 << 10,
        state "optional" => Optional / IN_OPTIONAL_STATE = 1 << 11,
        state "required" => Required / IN_REQUIRED_STATE = 1 << 12,
        state "read-only" => ReadOnly / IN_READ_ONLY_STATE = 1 << 13,
        state "read-write" => ReadWrite / IN_READ_WRITE_STATE = 1 << 14,
        state "valid" => Valid / IN_VALID_STATE = 1 << 15,
        state "invalid" => Invalid / IN_INVALID_STATE = 1 << 16,
        state "in-range" => InRange / IN_IN_RANGE_STATE = 1 << 17,
        state "out-of-range" => OutOfRange / IN_OUT_OF_RANGE_STATE = 1 << 18,
        state "placeholder-shown" => PlaceholderShown / IN_PLACEHOLDER_SHOWN_STATE = 1 << 19,
        state "-webkit-autofill" => Autofill / IN_AUTOFILL_STATE = 1 << 20,
        state "-webkit-drag" => Drag / IN_DRAG_STATE = 1 << 21,
        state "-webkit-full-screen" => FullScreen / IN_FULL_SCREEN_STATE = 1 << 22,
        state "-webkit-full-screen-ancestor" => FullScreenAncestor / IN_FULL_SCREEN_ANCESTOR_STATE = 1 << 23,
        #[doc = "A custom element that has not been upgraded yet."]
        state "unresolved" => Unresolved / IN_UNRESOLVED_STATE = 1 << 24,
        state "defined" => Defined / IN_DEFINED_STATE = 1 << 25,
        #[doc = "The window containing the element is not focused. This one is \
                 tracked per document, not per element."]
        state "window-inactive" => WindowInactive / IN_WINDOW_INACTIVE_STATE = 1 << 26,
    }}
}

macro_rules! non_ts_pseudo_classes {
    ($(
        $(#[$($flag_attr: tt)*])*
        state $css: expr => $variant: ident / $flag: ident = $value: expr,
    )+) => {
        bitflags! {
            /// Element states matched by state pseudo-classes.
            #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
            pub struct ElementState: u32 {
                $($(#[$($flag_attr)*])* const $flag = $value;)+
            }
        }

        /// Non tree-structural pseudo-classes.
        /// (see: https://drafts.csswg.org/selectors/#structural-pseudos)
        #[derive(Clone, Debug, Eq, Hash, PartialEq)]
        pub enum NonTSPseudoClass {
            $($(#[$($flag_attr)*])* $variant,)+
            /// `:lang(...)`. Not backed by a state bit.
            Lang(Atom),
        }

        impl NonTSPseudoClass {
            /// The state bits whose change may change whether this
            /// pseudo-class matches.
            pub fn state_flag(&self) -> ElementState {
                match *self {
                    $(NonTSPseudoClass::$variant => ElementState::$flag,)+
                    NonTSPseudoClass::Lang(..) => ElementState::empty(),
                }
            }

            /// Parses the name of a non-functional state pseudo-class.
            pub fn from_state_ident(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($css) {
                        return Some(NonTSPseudoClass::$variant)
                    }
                )+
                None
            }

            /// Calls `f` with every state pseudo-class.
            pub fn each_state_pseudo_class<F>(mut f: F)
                where F: FnMut(NonTSPseudoClass)
            {
                $(f(NonTSPseudoClass::$variant);)+
            }
        }
    }
}

state_pseudo_classes!(non_ts_pseudo_classes);
