use std::sync::Arc;

use eframe::egui;
use egui::{CentralPanel, Color32, ComboBox, Context, Separator, SidePanel, Ui};
use egui_graphs::{
    DefaultEdgeShape, DefaultNodeShape, FruchtermanReingoldWithCenterGravity,
    FruchtermanReingoldWithCenterGravityState, LayoutForceDirected, SettingsInteraction,
    SettingsNavigation,
};
use petgraph::{Undirected, csr::DefaultIx};
use tokio::runtime::Runtime;

use fabric_sim::{
    config::OverlayConfig,
    network::{NodeId, link::Link, node::Node},
    overlay::SegmentId,
    simulation::{self, ErrorReport, SimulationError},
    topology::{SnapshotStore, TopologySource},
};

use crate::gui::{
    fabric_graph::FabricGraph,
    panels::{
        collapsible_section, info_icon, notes_list, router_details, routes_table, tunnels_table,
    },
};

type Layout = FruchtermanReingoldWithCenterGravity;
type LayoutState = FruchtermanReingoldWithCenterGravityState;

/// Everything the dashboard needs from `main`.
pub struct DashboardContext {
    pub runtime: Arc<Runtime>,
    pub source: Box<dyn TopologySource>,
    pub overlay: OverlayConfig,
    pub store: Arc<SnapshotStore>,
}

pub fn main(context: DashboardContext) -> Result<(), eframe::Error> {
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Fabric simulator",
        native_options,
        Box::new(move |cc| {
            let runtime = context.runtime.clone();
            let app = runtime.block_on(App::new(cc, context));
            Ok(Box::new(app) as Box<dyn eframe::App>)
        }),
    )
}

struct App {
    source: Box<dyn TopologySource>,
    overlay: OverlayConfig,
    store: Arc<SnapshotStore>,

    graph: FabricGraph,

    runtime: Arc<Runtime>,
    layout_state: LayoutState,

    selected_router: Option<NodeId>,
    selected_segment: Option<SegmentId>,
    last_error: Option<ErrorReport>,
}

impl App {
    async fn new(cc: &eframe::CreationContext<'_>, context: DashboardContext) -> Self {
        let _ = cc;

        let mut app = Self {
            source: context.source,
            overlay: context.overlay,
            store: context.store,
            graph: FabricGraph::default(),
            runtime: context.runtime,
            layout_state: LayoutState::default(),
            selected_router: None,
            selected_segment: None,
            last_error: None,
        };
        app.refresh_from_source().await;
        app
    }

    fn read_data(&mut self) {
        if let Some(router) = self.graph.selected_router() {
            self.selected_router = Some(router);
        }
    }

    /// Refetch the topology, rerun the pipeline and publish the result.
    async fn refresh_from_source(&mut self) {
        match self.recompute().await {
            Ok(()) => self.last_error = None,
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "recomputation failed, keeping previous snapshot");
                self.last_error = Some(e.report());
            }
        }
    }

    async fn recompute(&mut self) -> Result<(), SimulationError> {
        let fabric = self.source.fetch_topology().await?;
        let report = simulation::simulate(&fabric, &self.overlay)?.report();
        let outcome = self.store.publish(report);
        if outcome.changed() {
            self.graph.reconcile(&fabric);
            self.graph.highlight_path(&[]);
        }
        Ok(())
    }

    fn render_status_section(&mut self, ui: &mut Ui) {
        ui.heading("Fabric");
        ui.label(self.source.describe());

        match self.store.latest() {
            Some(snapshot) => {
                ui.label(format!("Revision {}", snapshot.revision));
                ui.label(format!("Published {}", snapshot.published_at_rfc3339()));
            }
            None => {
                ui.label("Nothing published yet");
            }
        }

        if let Some(error) = &self.last_error {
            ui.colored_label(Color32::LIGHT_RED, format!("{}: {}", error.kind, error.message));
        }

        if ui
            .button("Recompute")
            .on_hover_text("Fetch the topology again and rerun the simulation")
            .clicked()
        {
            tracing::info!("recompute requested from dashboard");
            let rt = self.runtime.clone();
            rt.block_on(self.refresh_from_source());
        }
    }

    fn render_routing_section(&mut self, ui: &mut Ui) {
        let Some(snapshot) = self.store.latest() else {
            return;
        };
        let report = &snapshot.report;

        collapsible_section(ui, "Routing tables", true, |ui| {
            let selected_text = self
                .selected_router
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "Select a router".to_string());
            ComboBox::from_label("Router")
                .selected_text(selected_text)
                .show_ui(ui, |ui| {
                    for router in report.routes.keys() {
                        ui.selectable_value(&mut self.selected_router, Some(router.clone()), router.as_str());
                    }
                });

            let Some(router) = &self.selected_router else {
                return;
            };
            if let Some(node) = report.topology.nodes.iter().find(|node| node.id == *router) {
                router_details(ui, node);
            }
            ui.separator();
            routes_table(ui, report.routes_of(router).unwrap_or_default());
        });
    }

    fn render_overlay_section(&mut self, ui: &mut Ui) {
        let Some(snapshot) = self.store.latest() else {
            return;
        };
        let report = &snapshot.report;
        let mut highlight = None;

        collapsible_section(ui, "Overlay segments", true, |ui| {
            let selected_text = self
                .selected_segment
                .and_then(|segment| report.overlay.segment(segment))
                .map(|segment| format!("{} ({})", segment.name, segment.id))
                .unwrap_or_else(|| "Select a segment".to_string());
            ComboBox::from_label("Segment")
                .selected_text(selected_text)
                .show_ui(ui, |ui| {
                    for segment in report.overlay.segments() {
                        ui.selectable_value(
                            &mut self.selected_segment,
                            Some(segment.id),
                            format!("{} ({})", segment.name, segment.id),
                        );
                    }
                });

            if let Some(segment) = self.selected_segment {
                let tunnels: Vec<_> = report.tunnels_of(segment).collect();
                if tunnels.is_empty() {
                    ui.label("No tunnels in this segment");
                } else if let Some(index) = tunnels_table(ui, tunnels.iter().copied()) {
                    highlight = tunnels[index].path();
                }
            }

            if !report.notes.is_empty() {
                ui.separator();
                notes_list(ui, &report.notes);
            }
            if let Some(sample) = &report.encapsulation {
                ui.separator();
                ui.label(format!("Sample encapsulation: {}", sample.summary));
                ui.monospace(&sample.header_hex);
            }
        });

        if let Some(path) = highlight {
            self.graph.highlight_path(&path);
        }
    }

    fn render_forces_section(&mut self, ui: &mut Ui) {
        collapsible_section(ui, "Forces", false, |ui| {
            ui.horizontal(|ui| {
                ui.add(egui::Slider::new(&mut self.layout_state.base.k_scale, 0.2..=3.0).text("k_scale"));
                info_icon(ui, "Scale ideal edge length k; >1 spreads the layout, <1 compacts it.");
            });
            ui.horizontal(|ui| {
                ui.add(egui::Slider::new(&mut self.layout_state.base.c_attract, 0.1..=3.0).text("c_attract"));
                info_icon(ui, "Attractive force along links.");
            });
            ui.horizontal(|ui| {
                ui.add(egui::Slider::new(&mut self.layout_state.base.c_repulse, 0.1..=3.0).text("c_repulse"));
                info_icon(ui, "Repulsive force between routers.");
            });
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.layout_state.extras.0.enabled, "center_gravity");
                info_icon(ui, "Pull toward the center of the view.");
            });
        });
    }

    fn render(&mut self, ctx: &Context) {
        SidePanel::right("right_panel").show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.render_status_section(ui);
                ui.add(Separator::default());
                self.render_routing_section(ui);
                ui.add(Separator::default());
                self.render_overlay_section(ui);
                ui.add(Separator::default());
                self.render_forces_section(ui);
            });
        });

        CentralPanel::default().show(ctx, |ui| {
            egui_graphs::set_layout_state(ui, self.layout_state.clone(), None);

            let widget = &mut egui_graphs::GraphView::<
                Node,
                Link,
                Undirected,
                DefaultIx,
                DefaultNodeShape,
                DefaultEdgeShape,
                LayoutState,
                LayoutForceDirected<Layout>,
            >::new(&mut self.graph.graph)
            .with_navigations(
                &SettingsNavigation::default()
                    .with_zoom_and_pan_enabled(false)
                    .with_fit_to_screen_enabled(true),
            )
            .with_interactions(&SettingsInteraction::default().with_node_selection_enabled(true));

            ui.add(widget);
        });
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        self.read_data();
        self.render(ctx);
    }
}
