// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub mod bases;
pub mod distance;
pub mod events;
pub mod expansion;
pub mod raw_context;
pub mod realignment;
