pub mod alert_feed;
pub mod app;
pub mod detail_panel;
pub mod layout;
pub mod mesh_view;
pub mod packet_anim;
