pub use crate::communication::comms::Comms;
pub use crate::communication::WorldRank;
pub use crate::controls::ControlEvent;
pub use crate::controls::ControlSource;
pub use crate::controls::IdleControls;
pub use crate::controls::ScriptedControls;
pub use crate::coordinator::Coordinator;
pub use crate::display::Display;
pub use crate::display::NullDisplay;
pub use crate::fluid::Worker;
pub use crate::parameters::SetupError;
pub use crate::parameters::SimulationParameters;
