pub mod consult; // Streaming consultation turn: gate → history → prompt → source → relay
pub mod note; // Clinical note synthesis from an encounter transcript
