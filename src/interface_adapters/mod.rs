// Interface adapters: surface protocol, network handling and the simulated radio.

pub mod http;
pub mod net;
pub mod protocol;
pub mod sim_radio;
pub mod state;
