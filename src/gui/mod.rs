/*!
Desktop dashboard.

- `app`: the eframe application, side panel and graph view.
- `fabric_graph`: the `egui_graphs` view of the fabric, reconciled in place on recomputation.
- `panels`: tables and small widgets used by the side panel.
*/

pub mod app;
pub mod fabric_graph;
pub mod panels;
